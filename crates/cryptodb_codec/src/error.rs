//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Input contained bytes after the encoded value.
    #[error("trailing bytes after encoded value")]
    TrailingBytes,

    /// String payload is not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Declared string length disagrees with the payload size.
    #[error("declared length {declared} exceeds payload of {available} bytes")]
    LengthMismatch {
        /// Length from the prefix.
        declared: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// String is too long to be length-prefixed.
    #[error("string of {len} bytes exceeds maximum encodable length")]
    StringTooLong {
        /// The string length in bytes.
        len: usize,
    },
}
