pub mod connection;
pub mod future;
pub mod message_id;
mod pending;

pub use connection::Connection;
pub use future::{ErrorResult, Outcome, ResultFuture, ResultHandler};
pub use message_id::MessageIdAllocator;

use crate::ber::BerWriter;
use crate::controls::Control;
use crate::ldap::{AuthorizationState, InboundResponse, LdapResult, Response};
use crate::DecodeError;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A request that can be sent on a [`Connection`] and correlated with its
/// result.
pub trait LdapRequest: Send + Sync + 'static {
    type Result: Response + Clone + fmt::Debug + Send + Sync + 'static;

    fn operation_name(&self) -> &'static str;

    fn controls(&self) -> &[Arc<dyn Control>];

    /// Writes the protocol op element of the request envelope.
    fn encode_op(&self, writer: &mut BerWriter);

    fn decode_result(
        &self,
        response: &InboundResponse,
        controls: Vec<Arc<dyn Control>>,
    ) -> Result<Self::Result, DecodeError>;

    /// Wraps a locally synthesized result in this request's result type.
    fn error_result(&self, result: LdapResult) -> Self::Result;

    /// Runs before the result is delivered, for non-exceptional results only.
    fn on_success(&self, _result: &Self::Result, _authorization: &RwLock<AuthorizationState>) {}
}
