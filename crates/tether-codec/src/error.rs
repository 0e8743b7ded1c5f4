//! Error types for the flat value codec.

use thiserror::Error;

/// Errors raised while encoding or decoding flat values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A delimited record has no field separator.
    #[error("Malformed record '{record}': missing field separator '{separator}'")]
    MalformedRecord {
        /// The offending record.
        record: String,
        /// The separator that was expected.
        separator: char,
    },

    /// Text to be encoded contains a separator the format reserves.
    #[error("Reserved character '{character}' in {position}: {text:?}")]
    ReservedCharacter {
        /// The reserved character found.
        character: char,
        /// Which part of the value contained it.
        position: &'static str,
        /// The rejected text.
        text: String,
    },

    /// A tagged envelope is missing one of its markers.
    #[error("Missing '{0}' marker")]
    MissingTag(&'static str),

    /// Input ended inside a length-prefixed field.
    #[error("Truncated field at byte {offset}")]
    Truncated {
        /// Byte offset of the field.
        offset: usize,
    },

    /// A length prefix is empty, non-numeric, or points inside a character.
    #[error("Invalid length prefix at byte {offset}")]
    InvalidLength {
        /// Byte offset of the field.
        offset: usize,
    },

    /// A length-prefixed field is not followed by its terminator.
    #[error("Field at byte {offset} is not terminated by ','")]
    MissingTerminator {
        /// Byte offset of the field.
        offset: usize,
    },

    /// A map key has no value field after it.
    #[error("Key '{key}' has no value")]
    MissingValue {
        /// The dangling key.
        key: String,
    },

    /// An outcome carries a tag this codec does not know.
    #[error("Unknown outcome tag: {0}")]
    UnknownTag(String),

    /// A failure code is not an unsigned 32-bit number.
    #[error("Invalid failure code: {0}")]
    InvalidCode(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
