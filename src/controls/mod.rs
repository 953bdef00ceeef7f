pub mod password_policy;
pub mod proxied_auth;
pub mod read_entry;
pub mod registry;

pub use password_policy::{
    PasswordPolicyError, PasswordPolicyRequestControl, PasswordPolicyRequestDecoder,
    PasswordPolicyResponseControl, PasswordPolicyResponseDecoder, PasswordPolicyWarning,
    OID_PASSWORD_POLICY,
};
pub use proxied_auth::{ProxiedAuthV2Control, ProxiedAuthV2Decoder, OID_PROXIED_AUTH_V2};
pub use read_entry::{
    ReadEntryPhase, ReadEntryRequestControl, ReadEntryRequestDecoder, ReadEntryResponseControl,
    ReadEntryResponseDecoder, OID_POST_READ, OID_PRE_READ,
};
pub use registry::{request_controls, response_controls, ControlRegistry};

use crate::DecodeError;
use bytes::Bytes;
use std::any::Any;
use std::fmt;

/// An OID-tagged extension attached to a request or response.
pub trait Control: fmt::Debug + Send + Sync + 'static {
    fn oid(&self) -> &str;

    fn is_critical(&self) -> bool;

    /// The encoded value, or `None` for value-less controls.
    fn value(&self) -> Option<Bytes>;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Control {
    pub fn downcast_ref<T: Control>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Stateless decoder for the control registered under [`ControlDecoder::oid`].
///
/// Each decoder enforces its own value presence and criticality rules.
pub trait ControlDecoder: Send + Sync + 'static {
    type Control: Control;

    fn oid(&self) -> &'static str;

    fn decode(&self, critical: bool, value: Option<&[u8]>) -> Result<Self::Control, DecodeError>;
}

/// A control whose OID has no registered decoder, kept as raw parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericControl {
    oid: String,
    critical: bool,
    value: Option<Bytes>,
}

impl GenericControl {
    pub fn new(oid: impl Into<String>, critical: bool, value: Option<Bytes>) -> Self {
        Self {
            oid: oid.into(),
            critical,
            value,
        }
    }
}

impl Control for GenericControl {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn value(&self) -> Option<Bytes> {
        self.value.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for GenericControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GenericControl(oid={}, criticality={}, valueLength={})",
            self.oid,
            self.critical,
            self.value.as_ref().map_or(0, |v| v.len())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_generic_control_accessors() {
        let control = GenericControl::new("1.2.3.4", true, Some(Bytes::from_static(b"abc")));
        assert_eq!(control.oid(), "1.2.3.4");
        assert!(control.is_critical());
        assert_eq!(control.value(), Some(Bytes::from_static(b"abc")));
        assert_eq!(
            control.to_string(),
            "GenericControl(oid=1.2.3.4, criticality=true, valueLength=3)"
        );
    }

    #[test]
    fn test_downcast_dyn_control() {
        let control: Arc<dyn Control> = Arc::new(GenericControl::new("1.2.3.4", false, None));
        assert!(control.downcast_ref::<GenericControl>().is_some());
        assert!(control.downcast_ref::<ProxiedAuthV2Control>().is_none());
    }
}
