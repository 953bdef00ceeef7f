// StartTLS extended operation (RFC 4511 section 4.14).

use super::{ExtendedOperation, ExtendedRequest};
use crate::controls::Control;
use crate::ldap::{LdapResult, ResultCode};
use crate::DecodeError;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const OID_START_TLS: &str = "1.3.6.1.4.1.1466.20037";

pub struct StartTlsOperation;

static START_TLS_OPERATION: StartTlsOperation = StartTlsOperation;

/// Asks the server to begin TLS on the connection. Has no value.
#[derive(Debug, Clone, Default)]
pub struct StartTlsRequest {
    controls: Vec<Arc<dyn Control>>,
}

impl StartTlsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_control(mut self, control: impl Control) -> Self {
        self.controls.push(Arc::new(control));
        self
    }
}

impl ExtendedRequest for StartTlsRequest {
    type Operation = StartTlsOperation;

    fn operation(&self) -> &'static StartTlsOperation {
        &START_TLS_OPERATION
    }

    fn request_name(&self) -> &str {
        OID_START_TLS
    }

    fn request_value(&self) -> Option<Bytes> {
        None
    }

    fn controls(&self) -> &[Arc<dyn Control>] {
        &self.controls
    }
}

impl fmt::Display for StartTlsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StartTLSExtendedRequest(requestName={}, controls={})",
            OID_START_TLS,
            self.controls.len()
        )
    }
}

impl ExtendedOperation for StartTlsOperation {
    type Request = StartTlsRequest;
    type Result = LdapResult;

    fn decode_request(&self, _name: &str, value: Option<&[u8]>) -> Result<StartTlsRequest, DecodeError> {
        if value.is_some() {
            debug!("Ignoring value on StartTLS request");
        }
        Ok(StartTlsRequest::new())
    }

    fn decode_response(&self, code: ResultCode, matched_dn: &str, diagnostic_message: &str) -> LdapResult {
        LdapResult::new(code)
            .with_matched_dn(matched_dn)
            .with_diagnostic_message(diagnostic_message)
    }

    // StartTLS responses carry no value; any name or value present is dropped.
    fn decode_response_with_value(
        &self,
        code: ResultCode,
        matched_dn: &str,
        diagnostic_message: &str,
        _response_name: Option<&str>,
        _response_value: Option<&[u8]>,
    ) -> Result<LdapResult, DecodeError> {
        Ok(self.decode_response(code, matched_dn, diagnostic_message))
    }
}
