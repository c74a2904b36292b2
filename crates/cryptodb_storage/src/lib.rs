//! # CryptoDB Storage
//!
//! Storage backend trait and implementations for CryptoDB.
//!
//! This crate provides the lowest-level storage abstraction for CryptoDB.
//! Storage backends are **opaque byte stores** - they do not interpret
//! the data they store.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, truncate, rewrite)
//! - No knowledge of the CryptoDB header or record formats
//! - Must be `Send + Sync` for concurrent access
//! - CryptoDB core owns all file format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - For persistent single-file stores using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use cryptodb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
