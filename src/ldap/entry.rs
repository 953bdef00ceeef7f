use crate::ber::{BerError, BerReader, BerWriter, TAG_SET};
use bytes::Bytes;
use std::fmt;

/// `[APPLICATION 4]` SearchResultEntry.
pub const TAG_SEARCH_RESULT_ENTRY: u8 = 0x64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<Bytes>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Values as UTF-8 text, skipping binary values.
    pub fn string_values(&self) -> Vec<&str> {
        self.values
            .iter()
            .filter_map(|v| std::str::from_utf8(v).ok())
            .collect()
    }
}

/// A directory entry as carried in search results and read-entry controls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResultEntry {
    pub dn: String,
    pub attributes: Vec<Attribute>,
}

impl SearchResultEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Case-insensitive lookup by attribute description.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn encode(&self, writer: &mut BerWriter) {
        writer.write_start_sequence_with_tag(TAG_SEARCH_RESULT_ENTRY);
        writer.write_octet_string(&self.dn);
        writer.write_start_sequence();
        for attr in &self.attributes {
            writer.write_start_sequence();
            writer.write_octet_string(&attr.name);
            writer.write_start_sequence_with_tag(TAG_SET);
            for value in &attr.values {
                writer.write_octet_string(value);
            }
            writer.write_end_sequence();
            writer.write_end_sequence();
        }
        writer.write_end_sequence();
        writer.write_end_sequence();
    }

    pub fn decode(reader: &mut BerReader) -> Result<Self, BerError> {
        reader.read_start_sequence_with_tag(TAG_SEARCH_RESULT_ENTRY)?;
        let dn = reader.read_octet_string_as_string()?;
        let mut attributes = Vec::new();
        reader.read_start_sequence()?;
        while reader.has_next_element() {
            reader.read_start_sequence()?;
            let name = reader.read_octet_string_as_string()?;
            let mut values = Vec::new();
            reader.read_start_sequence_with_tag(TAG_SET)?;
            while reader.has_next_element() {
                values.push(Bytes::copy_from_slice(reader.read_octet_string()?));
            }
            reader.read_end_sequence()?;
            reader.read_end_sequence()?;
            attributes.push(Attribute { name, values });
        }
        reader.read_end_sequence()?;
        reader.read_end_sequence()?;
        Ok(Self { dn, attributes })
    }
}

impl fmt::Display for SearchResultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SearchResultEntry(dn=\"{}\", attributes=[", self.dn)?;
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:?}", attr.name, attr.string_values())?;
        }
        f.write_str("])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> SearchResultEntry {
        SearchResultEntry::new("uid=bob,ou=people,dc=example,dc=com")
            .with_attribute(Attribute::new("cn").with_value("Bob Smith").with_value("Bobby"))
            .with_attribute(Attribute::new("mail").with_value("bob@example.com"))
            .with_attribute(Attribute::new("jpegPhoto").with_value(vec![0xFFu8, 0xD8, 0xFF]))
    }

    #[test]
    fn test_encode_search_result_entry_layout() {
        let entry = SearchResultEntry::new("dc=x").with_attribute(Attribute::new("dc").with_value("x"));
        let mut writer = BerWriter::new();
        entry.encode(&mut writer);
        let bytes = writer.finish();
        assert_eq!(
            &bytes[..],
            &[
                0x64, 0x13, 0x04, 0x04, b'd', b'c', b'=', b'x', 0x30, 0x0B, 0x30, 0x09, 0x04,
                0x02, b'd', b'c', 0x31, 0x03, 0x04, 0x01, b'x',
            ]
        );
    }

    #[test]
    fn test_decode_encoded_entry() {
        let entry = sample_entry();
        let mut writer = BerWriter::new();
        entry.encode(&mut writer);
        let bytes = writer.finish();

        let decoded = SearchResultEntry::decode(&mut BerReader::new(&bytes)).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.attribute("CN").unwrap().string_values(), vec!["Bob Smith", "Bobby"]);
        assert!(decoded.attribute("jpegPhoto").unwrap().string_values().is_empty());
    }

    #[test]
    fn test_decode_entry_wrong_tag() {
        let data = [0x30, 0x02, 0x04, 0x00];
        let err = SearchResultEntry::decode(&mut BerReader::new(&data)).unwrap_err();
        assert_eq!(err, BerError::UnexpectedTag { expected: 0x64, actual: 0x30 });
    }

    #[test]
    fn test_decode_entry_truncated() {
        let data = [0x64, 0x10, 0x04, 0x04, b'd', b'c'];
        assert!(SearchResultEntry::decode(&mut BerReader::new(&data)).is_err());
    }

    #[test]
    fn test_entry_display() {
        let entry = SearchResultEntry::new("dc=x").with_attribute(Attribute::new("dc").with_value("x"));
        assert_eq!(entry.to_string(), "SearchResultEntry(dn=\"dc=x\", attributes=[dc=[\"x\"]])");
    }
}
