pub mod reader;
pub mod writer;

pub use reader::BerReader;
pub use writer::BerWriter;

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_ENUMERATED: u8 = 0x0A;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

/// Context-specific primitive tag `[n]`.
pub const fn context_tag(n: u8) -> u8 {
    0x80 | (n & 0x1F)
}

/// Context-specific constructed tag `[n]`.
pub const fn context_constructed_tag(n: u8) -> u8 {
    0xA0 | (n & 0x1F)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BerError {
    #[error("BER truncated: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("expected tag 0x{expected:02X}, got 0x{actual:02X}")]
    UnexpectedTag { expected: u8, actual: u8 },

    #[error("indefinite length not supported")]
    IndefiniteLength,

    #[error("length too large: {0} length bytes")]
    LengthTooLarge(usize),

    #[error("multi-byte tag 0x{0:02X} not supported")]
    UnsupportedTag(u8),

    #[error("invalid integer length: {0} bytes")]
    InvalidIntegerLength(usize),

    #[error("invalid boolean length: {0} bytes")]
    InvalidBooleanLength(usize),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    #[error("no sequence to end")]
    NoOpenSequence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_tags() {
        assert_eq!(context_tag(0), 0x80);
        assert_eq!(context_tag(1), 0x81);
        assert_eq!(context_constructed_tag(0), 0xA0);
        assert_eq!(context_constructed_tag(3), 0xA3);
    }

    #[test]
    fn test_ber_error_messages() {
        let err = BerError::UnexpectedTag { expected: 0x04, actual: 0x30 };
        assert_eq!(err.to_string(), "expected tag 0x04, got 0x30");
        let err = BerError::Truncated { needed: 5, remaining: 2 };
        assert_eq!(err.to_string(), "BER truncated: need 5 bytes, 2 remaining");
    }
}
