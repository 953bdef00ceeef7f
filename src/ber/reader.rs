// BER reader for control and extended operation values.
// Supports single-byte tags and definite lengths, which is all LDAP uses.

use super::{BerError, TAG_BOOLEAN, TAG_ENUMERATED, TAG_INTEGER, TAG_OCTET_STRING, TAG_SEQUENCE};
use tracing::debug;

type Result<T> = std::result::Result<T, BerError>;

/// Element header: tag, content length and header length.
#[derive(Debug, Clone, Copy)]
struct Header {
    tag: u8,
    length: usize,
    header_len: usize,
}

pub struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
    // End offsets of the sequences currently being read, innermost last.
    limits: Vec<usize>,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            limits: Vec::new(),
        }
    }

    fn limit(&self) -> usize {
        self.limits.last().copied().unwrap_or(self.data.len())
    }

    /// Bytes left in the innermost open sequence (or the whole input).
    pub fn remaining(&self) -> usize {
        self.limit().saturating_sub(self.pos)
    }

    /// Whether the innermost open sequence has another element.
    pub fn has_next_element(&self) -> bool {
        self.remaining() > 0
    }

    /// Whether a complete element (header and content) can be read at the cursor.
    pub fn element_available(&self) -> bool {
        match self.peek_header() {
            Ok(header) => header.header_len + header.length <= self.remaining(),
            Err(_) => false,
        }
    }

    pub fn peek_type(&self) -> Result<u8> {
        if self.remaining() == 0 {
            return Err(BerError::Truncated { needed: 1, remaining: 0 });
        }
        Ok(self.data[self.pos])
    }

    pub fn peek_length(&self) -> Result<usize> {
        Ok(self.peek_header()?.length)
    }

    fn peek_header(&self) -> Result<Header> {
        let limit = self.limit();
        let mut at = self.pos;
        if at >= limit {
            return Err(BerError::Truncated { needed: 1, remaining: 0 });
        }
        let tag = self.data[at];
        if tag & 0x1F == 0x1F {
            return Err(BerError::UnsupportedTag(tag));
        }
        at += 1;

        if at >= limit {
            return Err(BerError::Truncated { needed: 1, remaining: 0 });
        }
        let first = self.data[at];
        at += 1;

        let length = if first & 0x80 == 0 {
            first as usize
        } else {
            let length_bytes = (first & 0x7F) as usize;
            if length_bytes == 0 {
                return Err(BerError::IndefiniteLength);
            }
            if length_bytes > 4 {
                return Err(BerError::LengthTooLarge(length_bytes));
            }
            if limit - at < length_bytes {
                return Err(BerError::Truncated {
                    needed: length_bytes,
                    remaining: limit - at,
                });
            }
            let mut length = 0usize;
            for &b in &self.data[at..at + length_bytes] {
                length = (length << 8) | b as usize;
            }
            at += length_bytes;
            length
        };

        Ok(Header {
            tag,
            length,
            header_len: at - self.pos,
        })
    }

    /// Reads one element whose content must fit in the current sequence.
    fn read_header_checked(&mut self) -> Result<Header> {
        let header = self.peek_header()?;
        let available = self.remaining() - header.header_len;
        if header.length > available {
            return Err(BerError::Truncated {
                needed: header.length,
                remaining: available,
            });
        }
        self.pos += header.header_len;
        Ok(header)
    }

    fn expect_tag(&mut self, expected: u8) -> Result<Header> {
        let actual = self.peek_type()?;
        if actual != expected {
            return Err(BerError::UnexpectedTag { expected, actual });
        }
        self.read_header_checked()
    }

    fn take(&mut self, length: usize) -> &'a [u8] {
        let content = &self.data[self.pos..self.pos + length];
        self.pos += length;
        content
    }

    /// Reads any element, returning its tag and content.
    pub fn read_element(&mut self) -> Result<(u8, &'a [u8])> {
        let header = self.read_header_checked()?;
        Ok((header.tag, self.take(header.length)))
    }

    pub fn read_start_sequence(&mut self) -> Result<()> {
        self.read_start_sequence_with_tag(TAG_SEQUENCE)
    }

    pub fn read_start_sequence_with_tag(&mut self, tag: u8) -> Result<()> {
        let header = self.expect_tag(tag)?;
        self.limits.push(self.pos + header.length);
        Ok(())
    }

    /// Closes the innermost sequence. Unread trailing elements are skipped.
    pub fn read_end_sequence(&mut self) -> Result<()> {
        let limit = self.limits.pop().ok_or(BerError::NoOpenSequence)?;
        if self.pos < limit {
            debug!("Skipping {} unread bytes at end of sequence", limit - self.pos);
            self.pos = limit;
        }
        Ok(())
    }

    pub fn read_octet_string(&mut self) -> Result<&'a [u8]> {
        self.read_octet_string_with_tag(TAG_OCTET_STRING)
    }

    pub fn read_octet_string_with_tag(&mut self, tag: u8) -> Result<&'a [u8]> {
        let header = self.expect_tag(tag)?;
        Ok(self.take(header.length))
    }

    pub fn read_octet_string_as_string(&mut self) -> Result<String> {
        let bytes = self.read_octet_string()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BerError::InvalidUtf8)
    }

    pub fn read_integer(&mut self) -> Result<i64> {
        self.read_integer_with_tag(TAG_INTEGER)
    }

    pub fn read_integer_with_tag(&mut self, tag: u8) -> Result<i64> {
        let header = self.expect_tag(tag)?;
        Self::decode_integer(self.take_integer(header.length)?)
    }

    /// Reads an integer regardless of its tag; CHOICE alternatives carry the
    /// selector in the tag.
    pub fn read_integer_any_tag(&mut self) -> Result<(u8, i64)> {
        let header = self.read_header_checked()?;
        let value = Self::decode_integer(self.take_integer(header.length)?)?;
        Ok((header.tag, value))
    }

    fn take_integer(&mut self, length: usize) -> Result<&'a [u8]> {
        if length == 0 || length > 8 {
            return Err(BerError::InvalidIntegerLength(length));
        }
        Ok(self.take(length))
    }

    fn decode_integer(bytes: &[u8]) -> Result<i64> {
        // Sign-extend from the first content octet.
        let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &b in bytes {
            value = (value << 8) | b as i64;
        }
        Ok(value)
    }

    pub fn read_enumerated(&mut self) -> Result<i64> {
        self.read_integer_with_tag(TAG_ENUMERATED)
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        let header = self.expect_tag(TAG_BOOLEAN)?;
        if header.length != 1 {
            return Err(BerError::InvalidBooleanLength(header.length));
        }
        Ok(self.take(1)[0] != 0)
    }
}
