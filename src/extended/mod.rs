pub mod connection_id;
pub mod generic;
pub mod start_tls;

pub use connection_id::{
    GetConnectionIdOperation, GetConnectionIdRequest, GetConnectionIdResult, OID_GET_CONNECTION_ID,
};
pub use generic::{ExtendedResult, GenericExtendedOperation, GenericExtendedRequest};
pub use start_tls::{StartTlsOperation, StartTlsRequest, OID_START_TLS};

use crate::ber::{context_tag, BerWriter};
use crate::client::LdapRequest;
use crate::controls::Control;
use crate::ldap::message::{InboundResponse, LDAP_EXTENDED_REQUEST, LDAP_EXTENDED_RESPONSE};
use crate::ldap::{LdapResult, Response, ResultCode};
use crate::DecodeError;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Decoding capability for one extended operation. Implementations are
/// stateless and shared as `static` instances.
pub trait ExtendedOperation: Send + Sync + 'static {
    type Request: ExtendedRequest;
    type Result: Response + Clone + fmt::Debug + Send + Sync + 'static;

    fn decode_request(&self, name: &str, value: Option<&[u8]>) -> Result<Self::Request, DecodeError>;

    /// Builds a result for a response carrying no name or value.
    fn decode_response(&self, code: ResultCode, matched_dn: &str, diagnostic_message: &str) -> Self::Result;

    fn decode_response_with_value(
        &self,
        code: ResultCode,
        matched_dn: &str,
        diagnostic_message: &str,
        response_name: Option<&str>,
        response_value: Option<&[u8]>,
    ) -> Result<Self::Result, DecodeError>;
}

pub trait ExtendedRequest: fmt::Debug + Send + Sync + 'static {
    type Operation: ExtendedOperation;

    fn operation(&self) -> &'static Self::Operation;

    fn request_name(&self) -> &str;

    fn request_value(&self) -> Option<Bytes>;

    fn controls(&self) -> &[Arc<dyn Control>];
}

/// Result type produced for an extended request.
pub type ExtendedResultOf<T> = <<T as ExtendedRequest>::Operation as ExtendedOperation>::Result;

impl<T: ExtendedRequest> LdapRequest for T {
    type Result = ExtendedResultOf<T>;

    fn operation_name(&self) -> &'static str {
        "extended"
    }

    fn controls(&self) -> &[Arc<dyn Control>] {
        ExtendedRequest::controls(self)
    }

    fn encode_op(&self, writer: &mut BerWriter) {
        writer.write_start_sequence_with_tag(LDAP_EXTENDED_REQUEST);
        writer.write_octet_string_with_tag(context_tag(0), self.request_name());
        if let Some(value) = self.request_value() {
            writer.write_octet_string_with_tag(context_tag(1), value);
        }
        writer.write_end_sequence();
    }

    fn decode_result(
        &self,
        response: &InboundResponse,
        controls: Vec<Arc<dyn Control>>,
    ) -> Result<Self::Result, DecodeError> {
        response.expect_op(LDAP_EXTENDED_RESPONSE)?;
        // Each operation decides whether an absent value is acceptable.
        let mut result = self.operation().decode_response_with_value(
            response.result_code,
            &response.matched_dn,
            &response.diagnostic_message,
            response.response_name.as_deref(),
            response.response_value.as_deref(),
        )?;
        let core = result.result_mut();
        core.referrals = response.referrals.clone();
        core.controls = controls;
        Ok(result)
    }

    fn error_result(&self, result: LdapResult) -> Self::Result {
        let mut error = self.operation().decode_response(
            result.result_code,
            &result.matched_dn,
            &result.diagnostic_message,
        );
        *error.result_mut() = result;
        error
    }
}

/// An inbound extended request, dispatched on its name.
#[derive(Debug)]
pub enum DecodedExtendedRequest {
    StartTls(StartTlsRequest),
    GetConnectionId(GetConnectionIdRequest),
    Generic(GenericExtendedRequest),
}

impl DecodedExtendedRequest {
    pub fn request_name(&self) -> &str {
        match self {
            DecodedExtendedRequest::StartTls(r) => r.request_name(),
            DecodedExtendedRequest::GetConnectionId(r) => r.request_name(),
            DecodedExtendedRequest::Generic(r) => r.request_name(),
        }
    }
}

/// Decodes an extended request with the operation registered for `name`,
/// or with the pass-through operation when none is.
pub fn decode_request(name: &str, value: Option<&[u8]>) -> Result<DecodedExtendedRequest, DecodeError> {
    let request = match name {
        OID_START_TLS => DecodedExtendedRequest::StartTls(StartTlsOperation.decode_request(name, value)?),
        OID_GET_CONNECTION_ID => DecodedExtendedRequest::GetConnectionId(
            GetConnectionIdOperation.decode_request(name, value)?,
        ),
        _ => {
            debug!("No extended operation registered for {}, passing through", name);
            DecodedExtendedRequest::Generic(GenericExtendedOperation.decode_request(name, value)?)
        }
    };
    Ok(request)
}
