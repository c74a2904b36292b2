//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for CryptoDB.
///
/// Storage backends are **opaque byte stores**. They provide simple
/// operations for reading, appending, truncating and rewriting data.
/// CryptoDB core owns all format interpretation - backends do not
/// understand the store header or sealed records.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` ensures all appended data is durable
/// - `rewrite` replaces the entire contents atomically with respect to
///   process crash: after a crash, either the old or the new contents are
///   visible, never a mixture
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the current size
    /// or an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all pending writes to the OS.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - after this returns,
    /// previously appended data survives process termination.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to the given size.
    ///
    /// Used to discard a torn tail after crash recovery.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically replaces the entire contents of the storage.
    ///
    /// Used by compaction: the caller assembles the full compacted image
    /// and swaps it in. A crash during `rewrite` must leave either the old
    /// or the new contents intact.
    fn rewrite(&mut self, data: &[u8]) -> StorageResult<()>;
}
