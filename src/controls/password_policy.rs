// Password Policy for LDAP Directories (draft-behera-ldap-password-policy).

use super::{Control, ControlDecoder};
use crate::ber::{context_tag, BerError, BerReader, BerWriter};
use crate::{DecodeError, DecodeErrorKind};
use bytes::Bytes;
use std::any::Any;
use std::fmt;

pub const OID_PASSWORD_POLICY: &str = "1.3.6.1.4.1.42.2.27.8.5.1";

const TYPE_WARNING_ELEMENT: u8 = 0xA0;
const TYPE_ERROR_ELEMENT: u8 = 0x81;

/// Warning carried by a password policy response. The CHOICE tag selects the
/// kind; each kind carries its own integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordPolicyWarning {
    /// Seconds until the password expires.
    TimeBeforeExpiration(i32),
    GraceLoginsRemaining(i32),
}

impl PasswordPolicyWarning {
    pub fn kind(&self) -> u8 {
        match self {
            PasswordPolicyWarning::TimeBeforeExpiration(_) => 0,
            PasswordPolicyWarning::GraceLoginsRemaining(_) => 1,
        }
    }

    pub fn value(&self) -> i32 {
        match self {
            PasswordPolicyWarning::TimeBeforeExpiration(v)
            | PasswordPolicyWarning::GraceLoginsRemaining(v) => *v,
        }
    }

    fn tag(&self) -> u8 {
        context_tag(self.kind())
    }

    fn from_tag(tag: u8, value: i32) -> Result<Self, DecodeError> {
        match tag {
            0x80 => Ok(PasswordPolicyWarning::TimeBeforeExpiration(value)),
            0x81 => Ok(PasswordPolicyWarning::GraceLoginsRemaining(value)),
            other => Err(DecodeError::invalid_enumeration(format!(
                "Unknown password policy warning type {:#04x}",
                other
            ))),
        }
    }
}

impl fmt::Display for PasswordPolicyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordPolicyWarning::TimeBeforeExpiration(v) => write!(f, "timeBeforeExpiration({})", v),
            PasswordPolicyWarning::GraceLoginsRemaining(v) => write!(f, "graceAuthNsRemaining({})", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordPolicyError {
    PasswordExpired,
    AccountLocked,
    ChangeAfterReset,
    PasswordModNotAllowed,
    MustSupplyOldPassword,
    InsufficientPasswordQuality,
    PasswordTooShort,
    PasswordTooYoung,
    PasswordInHistory,
}

impl PasswordPolicyError {
    pub fn code(&self) -> i32 {
        match self {
            PasswordPolicyError::PasswordExpired => 0,
            PasswordPolicyError::AccountLocked => 1,
            PasswordPolicyError::ChangeAfterReset => 2,
            PasswordPolicyError::PasswordModNotAllowed => 3,
            PasswordPolicyError::MustSupplyOldPassword => 4,
            PasswordPolicyError::InsufficientPasswordQuality => 5,
            PasswordPolicyError::PasswordTooShort => 6,
            PasswordPolicyError::PasswordTooYoung => 7,
            PasswordPolicyError::PasswordInHistory => 8,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        let error = match code {
            0 => PasswordPolicyError::PasswordExpired,
            1 => PasswordPolicyError::AccountLocked,
            2 => PasswordPolicyError::ChangeAfterReset,
            3 => PasswordPolicyError::PasswordModNotAllowed,
            4 => PasswordPolicyError::MustSupplyOldPassword,
            5 => PasswordPolicyError::InsufficientPasswordQuality,
            6 => PasswordPolicyError::PasswordTooShort,
            7 => PasswordPolicyError::PasswordTooYoung,
            8 => PasswordPolicyError::PasswordInHistory,
            _ => return None,
        };
        Some(error)
    }
}

impl fmt::Display for PasswordPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PasswordPolicyError::PasswordExpired => "passwordExpired",
            PasswordPolicyError::AccountLocked => "accountLocked",
            PasswordPolicyError::ChangeAfterReset => "changeAfterReset",
            PasswordPolicyError::PasswordModNotAllowed => "passwordModNotAllowed",
            PasswordPolicyError::MustSupplyOldPassword => "mustSupplyOldPassword",
            PasswordPolicyError::InsufficientPasswordQuality => "insufficientPasswordQuality",
            PasswordPolicyError::PasswordTooShort => "passwordTooShort",
            PasswordPolicyError::PasswordTooYoung => "passwordTooYoung",
            PasswordPolicyError::PasswordInHistory => "passwordInHistory",
        };
        f.write_str(name)
    }
}

/// Asks the server to report password policy state. Carries no value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordPolicyRequestControl {
    critical: bool,
}

impl PasswordPolicyRequestControl {
    pub fn new(critical: bool) -> Self {
        Self { critical }
    }
}

impl Control for PasswordPolicyRequestControl {
    fn oid(&self) -> &str {
        OID_PASSWORD_POLICY
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn value(&self) -> Option<Bytes> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for PasswordPolicyRequestControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PasswordPolicyRequestControl(oid={}, criticality={})",
            OID_PASSWORD_POLICY, self.critical
        )
    }
}

/// Password policy state returned by the server. Warning and error are
/// independent; either, both or neither may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordPolicyResponseControl {
    critical: bool,
    warning: Option<PasswordPolicyWarning>,
    error: Option<PasswordPolicyError>,
}

impl PasswordPolicyResponseControl {
    pub fn new(critical: bool) -> Self {
        Self {
            critical,
            ..Self::default()
        }
    }

    pub fn warning(&self) -> Option<PasswordPolicyWarning> {
        self.warning
    }

    pub fn error(&self) -> Option<PasswordPolicyError> {
        self.error
    }

    pub fn set_warning(&mut self, warning: Option<PasswordPolicyWarning>) -> &mut Self {
        self.warning = warning;
        self
    }

    pub fn set_error(&mut self, error: Option<PasswordPolicyError>) -> &mut Self {
        self.error = error;
        self
    }

    pub fn with_warning(mut self, warning: PasswordPolicyWarning) -> Self {
        self.warning = Some(warning);
        self
    }

    pub fn with_error(mut self, error: PasswordPolicyError) -> Self {
        self.error = Some(error);
        self
    }
}

impl Control for PasswordPolicyResponseControl {
    fn oid(&self) -> &str {
        OID_PASSWORD_POLICY
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn value(&self) -> Option<Bytes> {
        let mut writer = BerWriter::with_capacity(16);
        writer.write_start_sequence();
        if let Some(warning) = &self.warning {
            writer
                .write_start_sequence_with_tag(TYPE_WARNING_ELEMENT)
                .write_integer_with_tag(warning.tag(), warning.value() as i64)
                .write_end_sequence();
        }
        if let Some(error) = &self.error {
            writer.write_integer_with_tag(TYPE_ERROR_ELEMENT, error.code() as i64);
        }
        writer.write_end_sequence();
        Some(writer.finish())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for PasswordPolicyResponseControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PasswordPolicyResponseControl(oid={}, criticality={}",
            OID_PASSWORD_POLICY, self.critical
        )?;
        if let Some(warning) = &self.warning {
            write!(f, ", warning={}", warning)?;
        }
        if let Some(error) = &self.error {
            write!(f, ", error={}", error)?;
        }
        f.write_str(")")
    }
}

pub struct PasswordPolicyRequestDecoder;

impl ControlDecoder for PasswordPolicyRequestDecoder {
    type Control = PasswordPolicyRequestControl;

    fn oid(&self) -> &'static str {
        OID_PASSWORD_POLICY
    }

    fn decode(&self, critical: bool, value: Option<&[u8]>) -> Result<Self::Control, DecodeError> {
        if value.is_some() {
            return Err(DecodeError::unexpected_value(
                "The password policy request control must not have a value",
            ));
        }
        Ok(PasswordPolicyRequestControl::new(critical))
    }
}

pub struct PasswordPolicyResponseDecoder;

fn malformed(cause: BerError) -> DecodeError {
    DecodeError::malformed("Cannot decode the password policy response control value", cause)
}

impl ControlDecoder for PasswordPolicyResponseDecoder {
    type Control = PasswordPolicyResponseControl;

    fn oid(&self) -> &'static str {
        OID_PASSWORD_POLICY
    }

    fn decode(&self, critical: bool, value: Option<&[u8]>) -> Result<Self::Control, DecodeError> {
        let value = value.ok_or_else(|| {
            DecodeError::missing_value("No value was provided for the password policy response control")
        })?;

        let mut reader = BerReader::new(value);
        let mut control = PasswordPolicyResponseControl::new(critical);
        reader.read_start_sequence().map_err(malformed)?;

        if reader.has_next_element() && reader.peek_type() == Ok(TYPE_WARNING_ELEMENT) {
            reader
                .read_start_sequence_with_tag(TYPE_WARNING_ELEMENT)
                .map_err(malformed)?;
            let (tag, raw) = reader.read_integer_any_tag().map_err(malformed)?;
            let value = i32::try_from(raw).map_err(|_| {
                DecodeError::new(
                    DecodeErrorKind::MalformedEncoding,
                    format!("Password policy warning value {} is out of range", raw),
                )
            })?;
            control.warning = Some(PasswordPolicyWarning::from_tag(tag, value)?);
            reader.read_end_sequence().map_err(malformed)?;
        }

        if reader.has_next_element() && reader.peek_type() == Ok(TYPE_ERROR_ELEMENT) {
            let code = reader
                .read_integer_with_tag(TYPE_ERROR_ELEMENT)
                .map_err(malformed)?;
            control.error = Some(PasswordPolicyError::from_code(code).ok_or_else(|| {
                DecodeError::invalid_enumeration(format!("Unknown password policy error code {}", code))
            })?);
        }

        reader.read_end_sequence().map_err(malformed)?;
        Ok(control)
    }
}
