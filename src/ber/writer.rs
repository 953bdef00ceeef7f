// BER writer producing definite, minimal-length encodings.

use super::{TAG_BOOLEAN, TAG_ENUMERATED, TAG_INTEGER, TAG_NULL, TAG_OCTET_STRING, TAG_SEQUENCE};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::error;

/// Writes into an in-memory buffer, so no operation can fail on I/O.
///
/// Sequence lengths are computed when the sequence is closed; calling
/// [`BerWriter::write_end_sequence`] without a matching start is a
/// programming error and is logged and ignored.
#[derive(Debug, Default)]
pub struct BerWriter {
    buffer: BytesMut,
    // Offsets where the content of each open sequence begins.
    open: Vec<usize>,
}

impl BerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            open: Vec::new(),
        }
    }

    fn write_length(buf: &mut BytesMut, length: usize) {
        if length < 128 {
            buf.put_u8(length as u8);
        } else {
            let bytes = length.to_be_bytes();
            let skip = bytes.iter().take_while(|&&b| b == 0).count();
            buf.put_u8(0x80 | (bytes.len() - skip) as u8);
            buf.put_slice(&bytes[skip..]);
        }
    }

    fn write_tlv(&mut self, tag: u8, content: &[u8]) -> &mut Self {
        self.buffer.put_u8(tag);
        Self::write_length(&mut self.buffer, content.len());
        self.buffer.put_slice(content);
        self
    }

    pub fn write_start_sequence(&mut self) -> &mut Self {
        self.write_start_sequence_with_tag(TAG_SEQUENCE)
    }

    pub fn write_start_sequence_with_tag(&mut self, tag: u8) -> &mut Self {
        self.buffer.put_u8(tag);
        self.open.push(self.buffer.len());
        self
    }

    pub fn write_end_sequence(&mut self) -> &mut Self {
        let Some(start) = self.open.pop() else {
            error!("BER writer: end of sequence without matching start");
            return self;
        };
        let content = self.buffer.split_off(start);
        Self::write_length(&mut self.buffer, content.len());
        self.buffer.unsplit(content);
        self
    }

    pub fn write_octet_string(&mut self, value: impl AsRef<[u8]>) -> &mut Self {
        self.write_tlv(TAG_OCTET_STRING, value.as_ref())
    }

    pub fn write_octet_string_with_tag(&mut self, tag: u8, value: impl AsRef<[u8]>) -> &mut Self {
        self.write_tlv(tag, value.as_ref())
    }

    pub fn write_integer(&mut self, value: i64) -> &mut Self {
        self.write_integer_with_tag(TAG_INTEGER, value)
    }

    pub fn write_integer_with_tag(&mut self, tag: u8, value: i64) -> &mut Self {
        let bytes = value.to_be_bytes();
        // Drop leading octets that only repeat the sign.
        let mut start = 0;
        while start < 7 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.write_tlv(tag, &bytes[start..])
    }

    pub fn write_enumerated(&mut self, value: i64) -> &mut Self {
        self.write_integer_with_tag(TAG_ENUMERATED, value)
    }

    pub fn write_boolean(&mut self, value: bool) -> &mut Self {
        self.write_tlv(TAG_BOOLEAN, &[if value { 0xFF } else { 0x00 }])
    }

    pub fn write_null(&mut self) -> &mut Self {
        self.write_tlv(TAG_NULL, &[])
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(mut self) -> Bytes {
        while !self.open.is_empty() {
            error!("BER writer: closing unterminated sequence");
            self.write_end_sequence();
        }
        self.buffer.freeze()
    }
}
