//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a record.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a record.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// Unknown element tag in an ordered key.
    #[error("invalid key tag {tag:#04x} at offset {offset}")]
    InvalidTag {
        /// The tag byte found.
        tag: u8,
        /// Offset of the tag within the key.
        offset: usize,
    },

    /// A zero byte inside a string or byte element was not followed by a valid escape.
    #[error("invalid escape at offset {offset}")]
    InvalidEscape {
        /// Offset of the zero byte.
        offset: usize,
    },

    /// A key element had a different type than the caller expected.
    #[error("expected {expected} key element, found {found}")]
    UnexpectedType {
        /// The type the caller asked for.
        expected: &'static str,
        /// The type present in the key.
        found: &'static str,
    },

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }
}
