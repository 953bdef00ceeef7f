// Get Connection ID extended operation (OpenDS 1.3.6.1.4.1.26027.1.6.2).

use super::{ExtendedOperation, ExtendedRequest};
use crate::ber::{BerReader, BerWriter};
use crate::controls::Control;
use crate::ldap::{LdapResult, Response, ResultCode};
use crate::{DecodeError, DecodeErrorKind};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const OID_GET_CONNECTION_ID: &str = "1.3.6.1.4.1.26027.1.6.2";

pub struct GetConnectionIdOperation;

static GET_CONNECTION_ID_OPERATION: GetConnectionIdOperation = GetConnectionIdOperation;

#[derive(Debug, Clone, Default)]
pub struct GetConnectionIdRequest {
    controls: Vec<Arc<dyn Control>>,
}

impl GetConnectionIdRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_control(mut self, control: impl Control) -> Self {
        self.controls.push(Arc::new(control));
        self
    }
}

impl ExtendedRequest for GetConnectionIdRequest {
    type Operation = GetConnectionIdOperation;

    fn operation(&self) -> &'static GetConnectionIdOperation {
        &GET_CONNECTION_ID_OPERATION
    }

    fn request_name(&self) -> &str {
        OID_GET_CONNECTION_ID
    }

    fn request_value(&self) -> Option<Bytes> {
        None
    }

    fn controls(&self) -> &[Arc<dyn Control>] {
        &self.controls
    }
}

/// Result carrying the server-assigned connection identifier. Error results
/// have none.
#[derive(Debug, Clone, PartialEq)]
pub struct GetConnectionIdResult {
    pub result: LdapResult,
    connection_id: Option<i32>,
}

impl GetConnectionIdResult {
    pub fn new(result: LdapResult, connection_id: Option<i32>) -> Self {
        Self {
            result,
            connection_id,
        }
    }

    pub fn connection_id(&self) -> Option<i32> {
        self.connection_id
    }

    pub fn set_connection_id(&mut self, connection_id: i32) -> &mut Self {
        self.connection_id = Some(connection_id);
        self
    }

    pub fn response_name(&self) -> &'static str {
        OID_GET_CONNECTION_ID
    }

    /// The connection ID encoded as a single INTEGER.
    pub fn response_value(&self) -> Option<Bytes> {
        self.connection_id.map(|id| {
            let mut writer = BerWriter::with_capacity(6);
            writer.write_integer(id as i64);
            writer.finish()
        })
    }
}

impl Response for GetConnectionIdResult {
    fn result(&self) -> &LdapResult {
        &self.result
    }

    fn result_mut(&mut self) -> &mut LdapResult {
        &mut self.result
    }
}

impl fmt::Display for GetConnectionIdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GetConnectionIDExtendedResponse(resultCode={}, matchedDN={}, diagnosticMessage={}, referrals={:?}, responseName={}, connectionID=",
            self.result.result_code,
            self.result.matched_dn,
            self.result.diagnostic_message,
            self.result.referrals,
            OID_GET_CONNECTION_ID
        )?;
        match self.connection_id {
            Some(id) => write!(f, "{}", id)?,
            None => f.write_str("none")?,
        }
        write!(f, ", controls={})", self.result.controls.len())
    }
}

fn decode_connection_id(value: &[u8]) -> Result<i32, DecodeError> {
    let mut reader = BerReader::new(value);
    let id = reader
        .read_integer()
        .map_err(|e| DecodeError::malformed("Cannot decode the get connection ID response value", e))?;
    i32::try_from(id).map_err(|_| {
        DecodeError::new(
            DecodeErrorKind::MalformedEncoding,
            format!("Connection ID {} is out of range", id),
        )
    })
}

impl ExtendedOperation for GetConnectionIdOperation {
    type Request = GetConnectionIdRequest;
    type Result = GetConnectionIdResult;

    fn decode_request(&self, _name: &str, value: Option<&[u8]>) -> Result<GetConnectionIdRequest, DecodeError> {
        if value.is_some() {
            debug!("Ignoring value on get connection ID request");
        }
        Ok(GetConnectionIdRequest::new())
    }

    fn decode_response(&self, code: ResultCode, matched_dn: &str, diagnostic_message: &str) -> GetConnectionIdResult {
        GetConnectionIdResult::new(
            LdapResult::new(code)
                .with_matched_dn(matched_dn)
                .with_diagnostic_message(diagnostic_message),
            None,
        )
    }

    fn decode_response_with_value(
        &self,
        code: ResultCode,
        matched_dn: &str,
        diagnostic_message: &str,
        _response_name: Option<&str>,
        response_value: Option<&[u8]>,
    ) -> Result<GetConnectionIdResult, DecodeError> {
        let mut result = self.decode_response(code, matched_dn, diagnostic_message);
        match response_value {
            Some(value) => {
                result.connection_id = Some(decode_connection_id(value)?);
            }
            None if !code.is_exceptional() => {
                return Err(DecodeError::missing_value(
                    "No value was provided for the get connection ID response",
                ));
            }
            None => {}
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_value_layout() {
        let result = GetConnectionIdResult::new(LdapResult::success(), Some(300));
        assert_eq!(result.response_value().unwrap().as_ref(), &[0x02, 0x02, 0x01, 0x2C]);
        assert_eq!(result.response_name(), OID_GET_CONNECTION_ID);
    }

    #[test]
    fn test_response_round_trip() {
        for id in [0, 1, 127, 128, -1, i32::MAX, i32::MIN] {
            let result = GetConnectionIdResult::new(LdapResult::success(), Some(id));
            let value = result.response_value().unwrap();
            let decoded = GetConnectionIdOperation
                .decode_response_with_value(
                    ResultCode::Success,
                    "",
                    "",
                    Some(result.response_name()),
                    Some(&value[..]),
                )
                .unwrap();
            assert_eq!(decoded, result);
        }
    }

    #[test]
    fn test_success_without_value_fails() {
        let err = GetConnectionIdOperation
            .decode_response_with_value(ResultCode::Success, "", "", Some(OID_GET_CONNECTION_ID), None)
            .unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MissingValue);
    }

    #[test]
    fn test_error_without_value_is_accepted() {
        let result = GetConnectionIdOperation
            .decode_response_with_value(ResultCode::UnwillingToPerform, "", "no", None, None)
            .unwrap();
        assert_eq!(result.connection_id(), None);
        assert_eq!(result.response_value(), None);
    }

    #[test]
    fn test_malformed_value_fails() {
        for value in [&[0x04, 0x01, 0x05][..], &[0x02, 0x00][..], &[0x02, 0x05, 0x01, 0, 0, 0, 0][..]] {
            let err = GetConnectionIdOperation
                .decode_response_with_value(ResultCode::Success, "", "", None, Some(value))
                .unwrap_err();
            assert_eq!(err.kind(), DecodeErrorKind::MalformedEncoding);
        }
    }

    #[test]
    fn test_display() {
        let mut result = GetConnectionIdResult::new(LdapResult::success(), None);
        result.set_connection_id(7);
        assert_eq!(
            result.to_string(),
            "GetConnectionIDExtendedResponse(resultCode=Success (0), matchedDN=, diagnosticMessage=, referrals=[], responseName=1.3.6.1.4.1.26027.1.6.2, connectionID=7, controls=0)"
        );
    }
}
