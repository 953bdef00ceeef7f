pub mod bind;
pub mod entry;
pub mod message;
pub mod result;

pub use bind::{AuthorizationState, BindAuthentication, BindRequest, BindResult};
pub use entry::{Attribute, SearchResultEntry};
pub use message::{InboundResponse, MessageId, RawControl};
pub use result::{LdapResult, Response, ResultCode};
