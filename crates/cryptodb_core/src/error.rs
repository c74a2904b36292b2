//! Error types for CryptoDB core.

use std::io;
use std::path::PathBuf;

use cryptodb_codec::ValueType;
use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in CryptoDB operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] cryptodb_storage::StorageError),

    /// Value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] cryptodb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A caller-supplied argument is invalid.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// The store file is already open within this process.
    #[error("store is already open: {}", path.display())]
    AlreadyOpen {
        /// Path of the store that is already open.
        path: PathBuf,
    },

    /// The operation requires an open store handle.
    #[error("store is not open")]
    NotOpen,

    /// The store file is held by another process or open handle.
    #[error("store is in use: {}", path.display())]
    InUse {
        /// Path of the store that is in use.
        path: PathBuf,
    },

    /// Authentication of the header or a record failed.
    ///
    /// Covers both a wrong uniqueness secret and on-disk tampering. The two
    /// cases are deliberately indistinguishable to the caller.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the failure.
        message: String,
    },

    /// The requested key does not exist.
    #[error("key not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// The stored value has a different type than the one requested.
    #[error("type mismatch: stored {stored}, requested {requested}")]
    TypeMismatch {
        /// Type of the stored value.
        stored: ValueType,
        /// Type the caller asked for.
        requested: ValueType,
    },

    /// A string value exceeds the caller-supplied length ceiling.
    #[error("length exceeded: value is {len} bytes, limit is {max_len}")]
    LengthExceeded {
        /// Byte length of the stored string.
        len: usize,
        /// Ceiling the caller supplied.
        max_len: usize,
    },
}

impl Error {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }
}
