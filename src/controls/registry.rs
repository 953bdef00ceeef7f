use super::{
    Control, ControlDecoder, GenericControl, PasswordPolicyRequestDecoder,
    PasswordPolicyResponseDecoder, ProxiedAuthV2Decoder, ReadEntryRequestDecoder,
    ReadEntryResponseDecoder,
};
use crate::ldap::message::RawControl;
use crate::DecodeError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

// Object-safe view of a ControlDecoder.
trait ErasedDecoder: Send + Sync {
    fn decode_shared(&self, critical: bool, value: Option<&[u8]>) -> Result<Arc<dyn Control>, DecodeError>;
}

impl<D: ControlDecoder> ErasedDecoder for D {
    fn decode_shared(&self, critical: bool, value: Option<&[u8]>) -> Result<Arc<dyn Control>, DecodeError> {
        let control = self.decode(critical, value)?;
        Ok(Arc::new(control))
    }
}

/// OID-keyed table of control decoders. Immutable once built.
pub struct ControlRegistry {
    decoders: HashMap<&'static str, Box<dyn ErasedDecoder>>,
}

pub struct ControlRegistryBuilder {
    decoders: HashMap<&'static str, Box<dyn ErasedDecoder>>,
}

impl ControlRegistryBuilder {
    /// Registers `decoder` under its OID, replacing any earlier decoder.
    pub fn register<D: ControlDecoder>(mut self, decoder: D) -> Self {
        let oid = decoder.oid();
        if self.decoders.insert(oid, Box::new(decoder)).is_some() {
            warn!("Replacing control decoder for OID {}", oid);
        }
        self
    }

    pub fn build(self) -> ControlRegistry {
        ControlRegistry {
            decoders: self.decoders,
        }
    }
}

impl ControlRegistry {
    pub fn builder() -> ControlRegistryBuilder {
        ControlRegistryBuilder {
            decoders: HashMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::builder().build()
    }

    pub fn contains(&self, oid: &str) -> bool {
        self.decoders.contains_key(oid)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decodes a control, falling back to [`GenericControl`] for unknown OIDs.
    pub fn decode(&self, oid: &str, critical: bool, value: Option<&[u8]>) -> Result<Arc<dyn Control>, DecodeError> {
        match self.decoders.get(oid) {
            Some(decoder) => decoder.decode_shared(critical, value),
            None => {
                debug!("No decoder registered for control {}, keeping it raw", oid);
                Ok(Arc::new(GenericControl::new(
                    oid,
                    critical,
                    value.map(bytes::Bytes::copy_from_slice),
                )))
            }
        }
    }

    pub fn decode_raw(&self, raw: &RawControl) -> Result<Arc<dyn Control>, DecodeError> {
        self.decode(&raw.oid, raw.critical, raw.value.as_deref())
    }

    /// Decodes every control in order, stopping at the first failure.
    pub fn decode_all(&self, raw: &[RawControl]) -> Result<Vec<Arc<dyn Control>>, DecodeError> {
        raw.iter().map(|c| self.decode_raw(c)).collect()
    }
}

static REQUEST_CONTROLS: Lazy<ControlRegistry> = Lazy::new(|| {
    ControlRegistry::builder()
        .register(ProxiedAuthV2Decoder)
        .register(PasswordPolicyRequestDecoder)
        .register(ReadEntryRequestDecoder::POST_READ)
        .register(ReadEntryRequestDecoder::PRE_READ)
        .build()
});

static RESPONSE_CONTROLS: Lazy<ControlRegistry> = Lazy::new(|| {
    ControlRegistry::builder()
        .register(PasswordPolicyResponseDecoder)
        .register(ReadEntryResponseDecoder::POST_READ)
        .register(ReadEntryResponseDecoder::PRE_READ)
        .build()
});

/// Process-wide decoders for controls found on requests.
pub fn request_controls() -> &'static ControlRegistry {
    &REQUEST_CONTROLS
}

/// Process-wide decoders for controls found on responses.
pub fn response_controls() -> &'static ControlRegistry {
    &RESPONSE_CONTROLS
}
