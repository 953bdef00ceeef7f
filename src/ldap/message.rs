// LDAPMessage envelope (RFC 4511 section 4.1.1): message ID, protocol op and
// the optional [0] controls block.

use crate::ber::{BerError, BerReader, BerWriter, TAG_BOOLEAN, TAG_OCTET_STRING};
use crate::controls::Control;
use crate::ldap::{LdapResult, ResultCode};
use crate::{DecodeError, DecodeErrorKind};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

pub type MessageId = i32;

pub const LDAP_BIND_REQUEST: u8 = 0x60;
pub const LDAP_BIND_RESPONSE: u8 = 0x61;
pub const LDAP_UNBIND_REQUEST: u8 = 0x42;
pub const LDAP_SEARCH_RESULT_DONE: u8 = 0x65;
pub const LDAP_MODIFY_RESPONSE: u8 = 0x67;
pub const LDAP_ADD_RESPONSE: u8 = 0x69;
pub const LDAP_DELETE_RESPONSE: u8 = 0x6B;
pub const LDAP_MODIFY_DN_RESPONSE: u8 = 0x6D;
pub const LDAP_COMPARE_RESPONSE: u8 = 0x6F;
pub const LDAP_ABANDON_REQUEST: u8 = 0x50;
pub const LDAP_EXTENDED_REQUEST: u8 = 0x77;
pub const LDAP_EXTENDED_RESPONSE: u8 = 0x78;

const TAG_CONTROLS: u8 = 0xA0;
const TAG_REFERRAL: u8 = 0xA3;
const TAG_SERVER_SASL_CREDS: u8 = 0x87;
const TAG_RESPONSE_NAME: u8 = 0x8A;
const TAG_RESPONSE_VALUE: u8 = 0x8B;

/// Operations whose body is an `LDAPResult`.
const RESULT_OPS: [u8; 8] = [
    LDAP_BIND_RESPONSE,
    LDAP_SEARCH_RESULT_DONE,
    LDAP_MODIFY_RESPONSE,
    LDAP_ADD_RESPONSE,
    LDAP_DELETE_RESPONSE,
    LDAP_MODIFY_DN_RESPONSE,
    LDAP_COMPARE_RESPONSE,
    LDAP_EXTENDED_RESPONSE,
];

/// A control as it appears on the wire, before OID-specific decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawControl {
    pub oid: String,
    pub critical: bool,
    pub value: Option<Bytes>,
}

impl RawControl {
    pub fn new(oid: impl Into<String>, critical: bool, value: Option<Bytes>) -> Self {
        Self {
            oid: oid.into(),
            critical,
            value,
        }
    }

    pub fn from_control(control: &dyn Control) -> Self {
        Self::new(control.oid(), control.is_critical(), control.value())
    }

    fn encode(&self, writer: &mut BerWriter) {
        writer.write_start_sequence();
        writer.write_octet_string(&self.oid);
        // DEFAULT FALSE is omitted.
        if self.critical {
            writer.write_boolean(true);
        }
        if let Some(value) = &self.value {
            writer.write_octet_string(value);
        }
        writer.write_end_sequence();
    }
}

fn encode_controls(writer: &mut BerWriter, controls: &[RawControl]) {
    if controls.is_empty() {
        return;
    }
    writer.write_start_sequence_with_tag(TAG_CONTROLS);
    for control in controls {
        control.encode(writer);
    }
    writer.write_end_sequence();
}

fn decode_controls(reader: &mut BerReader) -> Result<Vec<RawControl>, BerError> {
    let mut controls = Vec::new();
    reader.read_start_sequence_with_tag(TAG_CONTROLS)?;
    while reader.has_next_element() {
        reader.read_start_sequence()?;
        let oid = reader.read_octet_string_as_string()?;
        let critical = if reader.has_next_element() && reader.peek_type()? == TAG_BOOLEAN {
            reader.read_boolean()?
        } else {
            false
        };
        let value = if reader.has_next_element() && reader.peek_type()? == TAG_OCTET_STRING {
            Some(Bytes::copy_from_slice(reader.read_octet_string()?))
        } else {
            None
        };
        reader.read_end_sequence()?;
        controls.push(RawControl {
            oid,
            critical,
            value,
        });
    }
    reader.read_end_sequence()?;
    Ok(controls)
}

/// Encodes a complete LDAPMessage. `op` writes the protocol operation.
pub fn encode_message<F>(message_id: MessageId, controls: &[Arc<dyn Control>], op: F) -> Bytes
where
    F: FnOnce(&mut BerWriter),
{
    let mut writer = BerWriter::with_capacity(64);
    writer.write_start_sequence();
    writer.write_integer(message_id as i64);
    op(&mut writer);
    let raw: Vec<RawControl> = controls
        .iter()
        .map(|c| RawControl::from_control(c.as_ref()))
        .collect();
    encode_controls(&mut writer, &raw);
    writer.write_end_sequence();
    writer.finish()
}

/// `AbandonRequest ::= [APPLICATION 16] MessageID`
pub fn encode_abandon_request(message_id: MessageId, abandoned: MessageId) -> Bytes {
    encode_message(message_id, &[], |writer| {
        writer.write_integer_with_tag(LDAP_ABANDON_REQUEST, abandoned as i64);
    })
}

/// Reads only the message ID of a PDU, without validating the rest.
pub fn peek_message_id(pdu: &[u8]) -> Option<MessageId> {
    let mut reader = BerReader::new(pdu);
    reader.read_start_sequence().ok()?;
    let id = reader.read_integer().ok()?;
    MessageId::try_from(id).ok()
}

/// A result-bearing response PDU with its controls still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundResponse {
    pub message_id: MessageId,
    pub op_tag: u8,
    pub result_code: ResultCode,
    pub matched_dn: String,
    pub diagnostic_message: String,
    pub referrals: Vec<String>,
    pub server_sasl_credentials: Option<Bytes>,
    pub response_name: Option<String>,
    pub response_value: Option<Bytes>,
    pub controls: Vec<RawControl>,
}

impl InboundResponse {
    pub fn new(message_id: MessageId, op_tag: u8, result_code: ResultCode) -> Self {
        Self {
            message_id,
            op_tag,
            result_code,
            matched_dn: String::new(),
            diagnostic_message: String::new(),
            referrals: Vec::new(),
            server_sasl_credentials: None,
            response_name: None,
            response_value: None,
            controls: Vec::new(),
        }
    }

    pub fn with_diagnostic_message(mut self, message: impl Into<String>) -> Self {
        self.diagnostic_message = message.into();
        self
    }

    pub fn with_matched_dn(mut self, dn: impl Into<String>) -> Self {
        self.matched_dn = dn.into();
        self
    }

    pub fn with_referral(mut self, uri: impl Into<String>) -> Self {
        self.referrals.push(uri.into());
        self
    }

    pub fn with_response(mut self, name: Option<&str>, value: Option<Bytes>) -> Self {
        self.response_name = name.map(str::to_string);
        self.response_value = value;
        self
    }

    pub fn with_server_sasl_credentials(mut self, credentials: Bytes) -> Self {
        self.server_sasl_credentials = Some(credentials);
        self
    }

    pub fn with_control(mut self, control: RawControl) -> Self {
        self.controls.push(control);
        self
    }

    /// Fails unless this response is the `expected` protocol operation.
    pub fn expect_op(&self, expected: u8) -> Result<(), DecodeError> {
        if self.op_tag != expected {
            return Err(DecodeError::new(
                DecodeErrorKind::MalformedEncoding,
                format!(
                    "Expected response operation 0x{:02x} for message {}, got 0x{:02x}",
                    expected, self.message_id, self.op_tag
                ),
            ));
        }
        Ok(())
    }

    /// Builds the result core from the wire fields and decoded controls.
    pub fn to_result(&self, controls: Vec<Arc<dyn Control>>) -> LdapResult {
        LdapResult {
            result_code: self.result_code,
            matched_dn: self.matched_dn.clone(),
            diagnostic_message: self.diagnostic_message.clone(),
            referrals: self.referrals.clone(),
            controls,
            cause: None,
        }
    }

    pub fn decode(pdu: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = BerReader::new(pdu);
        let malformed = |e: BerError| DecodeError::malformed("Cannot decode LDAP response message", e);

        reader.read_start_sequence().map_err(malformed)?;
        let message_id = reader.read_integer().map_err(malformed)?;
        let message_id = MessageId::try_from(message_id).map_err(|_| {
            DecodeError::new(
                DecodeErrorKind::MalformedEncoding,
                format!("Message ID {} is out of range", message_id),
            )
        })?;

        let op_tag = reader.peek_type().map_err(malformed)?;
        if !RESULT_OPS.contains(&op_tag) {
            return Err(DecodeError::new(
                DecodeErrorKind::MalformedEncoding,
                format!("Unsupported response operation 0x{:02x}", op_tag),
            ));
        }
        debug!("Decoding LDAP response: id={}, op_tag=0x{:02x}", message_id, op_tag);

        let mut response = Self::decode_op(&mut reader, message_id, op_tag).map_err(malformed)?;

        if reader.has_next_element() && reader.peek_type().map_err(malformed)? == TAG_CONTROLS {
            response.controls = decode_controls(&mut reader).map_err(malformed)?;
        }
        reader.read_end_sequence().map_err(malformed)?;
        Ok(response)
    }

    fn decode_op(reader: &mut BerReader, message_id: MessageId, op_tag: u8) -> Result<Self, BerError> {
        reader.read_start_sequence_with_tag(op_tag)?;
        let code = reader.read_enumerated()?;
        let result_code = ResultCode::from_code(i32::try_from(code).unwrap_or(i32::MAX));
        let mut response = Self::new(message_id, op_tag, result_code);
        response.matched_dn = reader.read_octet_string_as_string()?;
        response.diagnostic_message = reader.read_octet_string_as_string()?;

        if reader.has_next_element() && reader.peek_type()? == TAG_REFERRAL {
            reader.read_start_sequence_with_tag(TAG_REFERRAL)?;
            while reader.has_next_element() {
                response.referrals.push(reader.read_octet_string_as_string()?);
            }
            reader.read_end_sequence()?;
        }

        if op_tag == LDAP_BIND_RESPONSE
            && reader.has_next_element()
            && reader.peek_type()? == TAG_SERVER_SASL_CREDS
        {
            let creds = reader.read_octet_string_with_tag(TAG_SERVER_SASL_CREDS)?;
            response.server_sasl_credentials = Some(Bytes::copy_from_slice(creds));
        }

        if op_tag == LDAP_EXTENDED_RESPONSE {
            if reader.has_next_element() && reader.peek_type()? == TAG_RESPONSE_NAME {
                let name = reader.read_octet_string_with_tag(TAG_RESPONSE_NAME)?;
                let name = String::from_utf8(name.to_vec()).map_err(|_| BerError::InvalidUtf8)?;
                response.response_name = Some(name);
            }
            if reader.has_next_element() && reader.peek_type()? == TAG_RESPONSE_VALUE {
                let value = reader.read_octet_string_with_tag(TAG_RESPONSE_VALUE)?;
                response.response_value = Some(Bytes::copy_from_slice(value));
            }
        }

        reader.read_end_sequence()?;
        Ok(response)
    }

    pub fn encode(&self) -> Bytes {
        let mut writer = BerWriter::with_capacity(64);
        writer.write_start_sequence();
        writer.write_integer(self.message_id as i64);
        writer.write_start_sequence_with_tag(self.op_tag);
        writer.write_enumerated(self.result_code.code() as i64);
        writer.write_octet_string(&self.matched_dn);
        writer.write_octet_string(&self.diagnostic_message);
        if !self.referrals.is_empty() {
            writer.write_start_sequence_with_tag(TAG_REFERRAL);
            for uri in &self.referrals {
                writer.write_octet_string(uri);
            }
            writer.write_end_sequence();
        }
        if let Some(creds) = &self.server_sasl_credentials {
            writer.write_octet_string_with_tag(TAG_SERVER_SASL_CREDS, creds);
        }
        if let Some(name) = &self.response_name {
            writer.write_octet_string_with_tag(TAG_RESPONSE_NAME, name);
        }
        if let Some(value) = &self.response_value {
            writer.write_octet_string_with_tag(TAG_RESPONSE_VALUE, value);
        }
        writer.write_end_sequence();
        encode_controls(&mut writer, &self.controls);
        writer.write_end_sequence();
        writer.finish()
    }
}
