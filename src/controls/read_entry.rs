// LDAP Read Entry controls (RFC 4527): Pre-Read and Post-Read.

use super::{Control, ControlDecoder};
use crate::ber::{BerError, BerReader, BerWriter};
use crate::ldap::SearchResultEntry;
use crate::DecodeError;
use bytes::Bytes;
use std::any::Any;
use std::fmt;

pub const OID_PRE_READ: &str = "1.3.6.1.1.13.1";
pub const OID_POST_READ: &str = "1.3.6.1.1.13.2";

/// Whether the entry is read before or after the update is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadEntryPhase {
    Pre,
    Post,
}

impl ReadEntryPhase {
    pub fn oid(&self) -> &'static str {
        match self {
            ReadEntryPhase::Pre => OID_PRE_READ,
            ReadEntryPhase::Post => OID_POST_READ,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ReadEntryPhase::Pre => "PreRead",
            ReadEntryPhase::Post => "PostRead",
        }
    }
}

/// Selects the attributes the server should return from the target entry.
/// An empty selection asks for all user attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadEntryRequestControl {
    phase: ReadEntryPhase,
    critical: bool,
    attributes: Vec<String>,
}

impl ReadEntryRequestControl {
    pub fn new(phase: ReadEntryPhase, critical: bool) -> Self {
        Self {
            phase,
            critical,
            attributes: Vec::new(),
        }
    }

    pub fn post_read(critical: bool) -> Self {
        Self::new(ReadEntryPhase::Post, critical)
    }

    pub fn pre_read(critical: bool) -> Self {
        Self::new(ReadEntryPhase::Pre, critical)
    }

    pub fn phase(&self) -> ReadEntryPhase {
        self.phase
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Adds an attribute selector; returns `false` if it was already present.
    pub fn add_attribute(&mut self, attribute: impl Into<String>) -> bool {
        let attribute = attribute.into();
        if self.attributes.contains(&attribute) {
            return false;
        }
        self.attributes.push(attribute);
        true
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for attribute in attributes {
            self.add_attribute(attribute);
        }
        self
    }
}

impl Control for ReadEntryRequestControl {
    fn oid(&self) -> &str {
        self.phase.oid()
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn value(&self) -> Option<Bytes> {
        let mut writer = BerWriter::new();
        writer.write_start_sequence();
        for attribute in &self.attributes {
            writer.write_octet_string(attribute);
        }
        writer.write_end_sequence();
        Some(writer.finish())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for ReadEntryRequestControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}RequestControl(oid={}, criticality={}, attributes={:?})",
            self.phase.name(),
            self.phase.oid(),
            self.critical,
            self.attributes
        )
    }
}

/// Carries a copy of the target entry as read by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadEntryResponseControl {
    phase: ReadEntryPhase,
    critical: bool,
    entry: SearchResultEntry,
}

impl ReadEntryResponseControl {
    pub fn new(phase: ReadEntryPhase, critical: bool, entry: SearchResultEntry) -> Self {
        Self {
            phase,
            critical,
            entry,
        }
    }

    pub fn phase(&self) -> ReadEntryPhase {
        self.phase
    }

    pub fn entry(&self) -> &SearchResultEntry {
        &self.entry
    }

    pub fn set_entry(&mut self, entry: SearchResultEntry) -> &mut Self {
        self.entry = entry;
        self
    }
}

impl Control for ReadEntryResponseControl {
    fn oid(&self) -> &str {
        self.phase.oid()
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn value(&self) -> Option<Bytes> {
        let mut writer = BerWriter::with_capacity(128);
        self.entry.encode(&mut writer);
        Some(writer.finish())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for ReadEntryResponseControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ResponseControl(oid={}, criticality={}, entry={})",
            self.phase.name(),
            self.phase.oid(),
            self.critical,
            self.entry
        )
    }
}

pub struct ReadEntryRequestDecoder(pub ReadEntryPhase);

impl ReadEntryRequestDecoder {
    pub const PRE_READ: Self = Self(ReadEntryPhase::Pre);
    pub const POST_READ: Self = Self(ReadEntryPhase::Post);
}

impl ControlDecoder for ReadEntryRequestDecoder {
    type Control = ReadEntryRequestControl;

    fn oid(&self) -> &'static str {
        self.0.oid()
    }

    fn decode(&self, critical: bool, value: Option<&[u8]>) -> Result<Self::Control, DecodeError> {
        let value = value.ok_or_else(|| {
            DecodeError::missing_value(format!(
                "No value was provided for the {} request control",
                self.0.name()
            ))
        })?;

        let read = || -> Result<ReadEntryRequestControl, BerError> {
            let mut reader = BerReader::new(value);
            let mut control = ReadEntryRequestControl::new(self.0, critical);
            reader.read_start_sequence()?;
            while reader.has_next_element() {
                control.add_attribute(reader.read_octet_string_as_string()?);
            }
            reader.read_end_sequence()?;
            Ok(control)
        };
        read().map_err(|e| {
            DecodeError::malformed(
                &format!("Cannot decode the {} request control value", self.0.name()),
                e,
            )
        })
    }
}

pub struct ReadEntryResponseDecoder(pub ReadEntryPhase);

impl ReadEntryResponseDecoder {
    pub const PRE_READ: Self = Self(ReadEntryPhase::Pre);
    pub const POST_READ: Self = Self(ReadEntryPhase::Post);
}

impl ControlDecoder for ReadEntryResponseDecoder {
    type Control = ReadEntryResponseControl;

    fn oid(&self) -> &'static str {
        self.0.oid()
    }

    fn decode(&self, critical: bool, value: Option<&[u8]>) -> Result<Self::Control, DecodeError> {
        let value = value.ok_or_else(|| {
            DecodeError::missing_value(format!(
                "No value was provided for the {} response control",
                self.0.name()
            ))
        })?;

        let entry = SearchResultEntry::decode(&mut BerReader::new(value)).map_err(|e| {
            DecodeError::malformed(
                &format!("Cannot decode the {} response control value", self.0.name()),
                e,
            )
        })?;
        Ok(ReadEntryResponseControl::new(self.0, critical, entry))
    }
}
