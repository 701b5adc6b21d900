/// Errors that can occur while framing or decoding netlink attributes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttrError {
    /// Fewer bytes than an attribute header remain where one is expected.
    #[error("truncated attribute header at offset {offset} ({remaining} bytes left)")]
    TruncatedHeader { offset: usize, remaining: usize },

    /// The declared attribute length does not even cover its own header.
    #[error("attribute at offset {offset} declares length {len}, shorter than its header")]
    LengthTooShort { offset: usize, len: usize },

    /// The declared attribute length runs past the end of the buffer.
    #[error("attribute at offset {offset} declares length {len} but only {remaining} bytes remain")]
    LengthOverflow {
        offset: usize,
        len: usize,
        remaining: usize,
    },

    /// Nested attributes go deeper than any known schema.
    #[error("attribute nesting exceeds maximum depth {max}")]
    NestingTooDeep { max: usize },

    /// The attribute is present but its payload has the wrong width.
    #[error("attribute {attr_type} has {actual} bytes, expected {expected}")]
    TypeMismatch {
        attr_type: u16,
        expected: usize,
        actual: usize,
    },

    /// A text attribute is not valid UTF-8.
    #[error("attribute {attr_type} is not valid UTF-8 text")]
    InvalidString { attr_type: u16 },

    /// A netlink message or fixed header is cut short.
    #[error("truncated message ({available} bytes, need {needed})")]
    TruncatedMessage { needed: usize, available: usize },

    /// An attribute or message is too large for its 16/32-bit length field.
    #[error("encoded size too large ({len} bytes, max {max})")]
    TooLarge { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, AttrError>;
