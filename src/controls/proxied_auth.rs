// Proxied Authorization v2 control (RFC 4370).

use super::{Control, ControlDecoder};
use crate::ber::{BerError, BerReader, TAG_OCTET_STRING};
use crate::DecodeError;
use bytes::Bytes;
use std::any::Any;
use std::fmt;
use tracing::debug;

pub const OID_PROXIED_AUTH_V2: &str = "2.16.840.1.113730.3.4.18";

/// Requests that an operation be processed under another authorization
/// identity (`"dn:<DN>"` or `"u:<userid>"`). Always critical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxiedAuthV2Control {
    authorization_id: String,
}

impl ProxiedAuthV2Control {
    pub fn new(authorization_id: impl Into<String>) -> Self {
        Self {
            authorization_id: authorization_id.into(),
        }
    }

    pub fn from_dn(authorization_dn: &str) -> Self {
        Self::new(format!("dn:{}", authorization_dn))
    }

    pub fn authorization_id(&self) -> &str {
        &self.authorization_id
    }

    pub fn set_authorization_id(&mut self, authorization_id: impl Into<String>) -> &mut Self {
        self.authorization_id = authorization_id.into();
        self
    }

    pub fn set_authorization_dn(&mut self, authorization_dn: &str) -> &mut Self {
        self.authorization_id = format!("dn:{}", authorization_dn);
        self
    }
}

impl Control for ProxiedAuthV2Control {
    fn oid(&self) -> &str {
        OID_PROXIED_AUTH_V2
    }

    fn is_critical(&self) -> bool {
        true
    }

    fn value(&self) -> Option<Bytes> {
        Some(Bytes::from(self.authorization_id.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for ProxiedAuthV2Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProxiedAuthorizationV2Control(oid={}, criticality=true, authorizationID=\"{}\")",
            OID_PROXIED_AUTH_V2, self.authorization_id
        )
    }
}

pub struct ProxiedAuthV2Decoder;

impl ControlDecoder for ProxiedAuthV2Decoder {
    type Control = ProxiedAuthV2Control;

    fn oid(&self) -> &'static str {
        OID_PROXIED_AUTH_V2
    }

    fn decode(&self, critical: bool, value: Option<&[u8]>) -> Result<Self::Control, DecodeError> {
        if !critical {
            return Err(DecodeError::criticality(
                "The proxied authorization V2 control must be marked critical",
            ));
        }
        let value = value.ok_or_else(|| {
            DecodeError::missing_value("No value was provided for the proxied authorization V2 control")
        })?;

        let mut reader = BerReader::new(value);
        let legacy = reader.element_available() && reader.peek_type() == Ok(TAG_OCTET_STRING);
        let authorization_id = if legacy {
            // Older senders wrap the identity in an extra octet string.
            debug!("Decoding legacy wrapped proxied authorization V2 value");
            reader.read_octet_string_as_string()
        } else {
            String::from_utf8(value.to_vec()).map_err(|_| BerError::InvalidUtf8)
        }
        .map_err(|e| DecodeError::malformed("Cannot decode the proxied authorization V2 control value", e))?;

        Ok(ProxiedAuthV2Control { authorization_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::BerWriter;
    use crate::DecodeErrorKind;

    fn wrapped(id: &str) -> Bytes {
        let mut writer = BerWriter::new();
        writer.write_octet_string(id);
        writer.finish()
    }

    #[test]
    fn test_new_and_from_dn() {
        let control = ProxiedAuthV2Control::from_dn("uid=bob,dc=example");
        assert_eq!(control.authorization_id(), "dn:uid=bob,dc=example");
        assert!(control.is_critical());
        assert_eq!(control.oid(), OID_PROXIED_AUTH_V2);
        assert_eq!(control.value(), Some(Bytes::from_static(b"dn:uid=bob,dc=example")));
    }

    #[test]
    fn test_setters() {
        let mut control = ProxiedAuthV2Control::new("u:alice");
        control.set_authorization_dn("cn=admin");
        assert_eq!(control.authorization_id(), "dn:cn=admin");
        control.set_authorization_id("u:bob");
        assert_eq!(control.authorization_id(), "u:bob");
    }

    #[test]
    fn test_decode_raw_value() {
        let control = ProxiedAuthV2Decoder
            .decode(true, Some(b"dn:uid=bob,dc=example".as_slice()))
            .unwrap();
        assert_eq!(control.authorization_id(), "dn:uid=bob,dc=example");
    }

    #[test]
    fn test_decode_legacy_wrapped_value() {
        let value = wrapped("dn:uid=bob,dc=example");
        let legacy = ProxiedAuthV2Decoder.decode(true, Some(&value[..])).unwrap();
        let raw = ProxiedAuthV2Decoder
            .decode(true, Some(b"dn:uid=bob,dc=example".as_slice()))
            .unwrap();
        assert_eq!(legacy, raw);
    }

    #[test]
    fn test_decode_empty_value_is_anonymous() {
        let control = ProxiedAuthV2Decoder.decode(true, Some(&[][..])).unwrap();
        assert_eq!(control.authorization_id(), "");
    }

    #[test]
    fn test_decode_non_critical_fails() {
        for value in [Some(b"u:bob".as_slice()), None, Some(&[0xFF, 0xFE][..])] {
            let err = ProxiedAuthV2Decoder.decode(false, value).unwrap_err();
            assert_eq!(err.kind(), DecodeErrorKind::CriticalityViolation);
        }
    }

    #[test]
    fn test_decode_missing_value_fails() {
        let err = ProxiedAuthV2Decoder.decode(true, None).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MissingValue);
    }

    #[test]
    fn test_decode_invalid_utf8_fails() {
        let err = ProxiedAuthV2Decoder.decode(true, Some(&[0xC3, 0x28][..])).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedEncoding);
        assert_eq!(err.ber_cause(), Some(&BerError::InvalidUtf8));
    }

    #[test]
    fn test_round_trip() {
        let control = ProxiedAuthV2Control::new("u:bob");
        let value = control.value().unwrap();
        let decoded = ProxiedAuthV2Decoder.decode(control.is_critical(), Some(&value[..])).unwrap();
        assert_eq!(decoded, control);
    }

    #[test]
    fn test_display() {
        let control = ProxiedAuthV2Control::new("u:bob");
        assert_eq!(
            control.to_string(),
            "ProxiedAuthorizationV2Control(oid=2.16.840.1.113730.3.4.18, criticality=true, authorizationID=\"u:bob\")"
        );
    }
}
