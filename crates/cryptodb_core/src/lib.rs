//! # CryptoDB Core
//!
//! Embedded, encrypted, single-file key-value store.
//!
//! This crate provides:
//! - Typed values (strings, 64-bit integers, 64-bit doubles)
//! - AES-256-GCM sealing of every value, key derived from caller-supplied
//!   uniqueness data via HKDF-SHA256
//! - An authenticated header so a wrong secret or a tampered file is
//!   detected before any value is served
//! - Crash-safe append-only persistence with tombstones and compaction
//! - Secure destruction that overwrites the file before unlinking it
//!
//! ## Usage
//!
//! ```no_run
//! use cryptodb_core::{Database, UNIQ_DATA_LEN};
//!
//! # fn main() -> cryptodb_core::Result<()> {
//! let secret = vec![0x42u8; UNIQ_DATA_LEN];
//! let db = Database::open("app.cdb", &secret)?;
//! db.put_string("greeting", "hello")?;
//! assert_eq!(db.get_string("greeting", 64)?, "hello");
//! db.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crypto;
pub mod database;
pub mod destroy;
pub mod error;
pub mod header;
pub mod kdf;
pub mod options;
pub mod record;
pub mod store;

pub use crypto::{EncryptionKey, KEY_SIZE};
pub use cryptodb_codec::{Value, ValueType};
pub use database::{default_options, set_default_options, Database};
pub use destroy::{destroy, destroy_with_options};
pub use error::{Error, Result};
pub use kdf::UNIQ_DATA_LEN;
pub use options::Options;

/// Library version, following the major.minor.revision convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Revision.
    pub revision: u32,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// Version of this library.
pub const VERSION: VersionInfo = VersionInfo {
    major: 1,
    minor: 0,
    revision: 0,
};

/// Returns the library version.
#[must_use]
pub const fn version() -> VersionInfo {
    VERSION
}

/// Returns the required uniqueness data length in bytes.
#[must_use]
pub const fn uniq_data_max_len() -> usize {
    UNIQ_DATA_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_stable() {
        let v = version();
        assert_eq!((v.major, v.minor, v.revision), (1, 0, 0));
        assert_eq!(v.to_string(), "1.0.0");
    }

    #[test]
    fn uniq_data_max_len_matches_constant() {
        assert_eq!(uniq_data_max_len(), 512);
    }
}
