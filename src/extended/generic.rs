use super::{ExtendedOperation, ExtendedRequest};
use crate::controls::Control;
use crate::ldap::{LdapResult, Response, ResultCode};
use crate::DecodeError;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Pass-through operation for names without a dedicated implementation.
/// Request and response values are kept opaque.
pub struct GenericExtendedOperation;

static GENERIC_EXTENDED_OPERATION: GenericExtendedOperation = GenericExtendedOperation;

#[derive(Debug, Clone)]
pub struct GenericExtendedRequest {
    name: String,
    value: Option<Bytes>,
    controls: Vec<Arc<dyn Control>>,
}

impl GenericExtendedRequest {
    pub fn new(name: impl Into<String>, value: Option<Bytes>) -> Self {
        Self {
            name: name.into(),
            value,
            controls: Vec::new(),
        }
    }

    pub fn with_control(mut self, control: impl Control) -> Self {
        self.controls.push(Arc::new(control));
        self
    }
}

impl ExtendedRequest for GenericExtendedRequest {
    type Operation = GenericExtendedOperation;

    fn operation(&self) -> &'static GenericExtendedOperation {
        &GENERIC_EXTENDED_OPERATION
    }

    fn request_name(&self) -> &str {
        &self.name
    }

    fn request_value(&self) -> Option<Bytes> {
        self.value.clone()
    }

    fn controls(&self) -> &[Arc<dyn Control>] {
        &self.controls
    }
}

impl fmt::Display for GenericExtendedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GenericExtendedRequest(requestName={}, requestValueLength={}, controls={})",
            self.name,
            self.value.as_ref().map_or(0, |v| v.len()),
            self.controls.len()
        )
    }
}

/// Extended result with an opaque response name and value.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedResult {
    pub result: LdapResult,
    pub response_name: Option<String>,
    pub response_value: Option<Bytes>,
}

impl ExtendedResult {
    pub fn new(result: LdapResult) -> Self {
        Self {
            result,
            response_name: None,
            response_value: None,
        }
    }
}

impl Response for ExtendedResult {
    fn result(&self) -> &LdapResult {
        &self.result
    }

    fn result_mut(&mut self) -> &mut LdapResult {
        &mut self.result
    }
}

impl ExtendedOperation for GenericExtendedOperation {
    type Request = GenericExtendedRequest;
    type Result = ExtendedResult;

    fn decode_request(&self, name: &str, value: Option<&[u8]>) -> Result<GenericExtendedRequest, DecodeError> {
        Ok(GenericExtendedRequest::new(name, value.map(Bytes::copy_from_slice)))
    }

    fn decode_response(&self, code: ResultCode, matched_dn: &str, diagnostic_message: &str) -> ExtendedResult {
        ExtendedResult::new(
            LdapResult::new(code)
                .with_matched_dn(matched_dn)
                .with_diagnostic_message(diagnostic_message),
        )
    }

    fn decode_response_with_value(
        &self,
        code: ResultCode,
        matched_dn: &str,
        diagnostic_message: &str,
        response_name: Option<&str>,
        response_value: Option<&[u8]>,
    ) -> Result<ExtendedResult, DecodeError> {
        let mut result = self.decode_response(code, matched_dn, diagnostic_message);
        result.response_name = response_name.map(str::to_string);
        result.response_value = response_value.map(Bytes::copy_from_slice);
        Ok(result)
    }
}
