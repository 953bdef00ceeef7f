pub mod ber;
pub mod client;
pub mod config;
pub mod controls;
pub mod extended;
pub mod ldap;
pub mod logging;

pub use client::{Connection, ErrorResult, Outcome, ResultFuture};
pub use config::Config;
pub use controls::{Control, ControlDecoder, ControlRegistry};
pub use extended::{ExtendedOperation, ExtendedRequest};
pub use ldap::{LdapResult, ResultCode};

use ber::BerError;
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum LdapExtError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("LDAP protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<::config::ConfigError> for LdapExtError {
    fn from(e: ::config::ConfigError) -> Self {
        LdapExtError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LdapExtError>;

/// Classifies why a control or extended operation value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    MissingValue,
    UnexpectedValue,
    MalformedEncoding,
    InvalidEnumeration,
    CriticalityViolation,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodeErrorKind::MissingValue => "missing required value",
            DecodeErrorKind::UnexpectedValue => "unexpected value",
            DecodeErrorKind::MalformedEncoding => "malformed encoding",
            DecodeErrorKind::InvalidEnumeration => "invalid enumeration",
            DecodeErrorKind::CriticalityViolation => "criticality violation",
        };
        f.write_str(name)
    }
}

/// The single failure type of every control and extended operation decoder.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DecodeError {
    kind: DecodeErrorKind,
    message: String,
    #[source]
    source: Option<BerError>,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn missing_value(message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::MissingValue, message)
    }

    pub fn unexpected_value(message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::UnexpectedValue, message)
    }

    pub fn invalid_enumeration(message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::InvalidEnumeration, message)
    }

    pub fn criticality(message: impl Into<String>) -> Self {
        Self::new(DecodeErrorKind::CriticalityViolation, message)
    }

    /// Wraps a BER fault, prefixing `context` to its description.
    pub fn malformed(context: &str, cause: BerError) -> Self {
        Self {
            kind: DecodeErrorKind::MalformedEncoding,
            message: format!("{}: {}", context, cause),
            source: Some(cause),
        }
    }

    pub fn kind(&self) -> DecodeErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn ber_cause(&self) -> Option<&BerError> {
        self.source.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::missing_value("no control value");
        assert_eq!(err.to_string(), "no control value");
        assert_eq!(err.kind(), DecodeErrorKind::MissingValue);
        assert!(err.ber_cause().is_none());
    }

    #[test]
    fn test_decode_error_malformed_keeps_cause() {
        let err = DecodeError::malformed("cannot decode value", BerError::Truncated { needed: 4, remaining: 1 });
        assert_eq!(err.kind(), DecodeErrorKind::MalformedEncoding);
        assert!(err.message().starts_with("cannot decode value: "));
        assert!(matches!(err.ber_cause(), Some(BerError::Truncated { .. })));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_from_decode_error() {
        let err: LdapExtError = DecodeError::unexpected_value("value present").into();
        assert!(matches!(err, LdapExtError::Decode(_)));
        assert_eq!(err.to_string(), "Decode error: value present");
    }

    #[test]
    fn test_decode_error_kind_display() {
        assert_eq!(DecodeErrorKind::CriticalityViolation.to_string(), "criticality violation");
        assert_eq!(DecodeErrorKind::InvalidEnumeration.to_string(), "invalid enumeration");
    }
}
