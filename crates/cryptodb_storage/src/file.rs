//! File-based storage backend for persistent single-file stores.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based storage backend.
///
/// This backend provides persistent storage for a single store file.
/// Data survives process restarts.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
/// - `rewrite()` uses write-to-temp-then-rename so a crash leaves either
///   the old or the new contents, never a mixture
///
/// # Locking
///
/// [`FileBackend::acquire_lock`] takes an fs2 advisory exclusive lock on
/// the file, preventing two processes from opening the same store. The
/// lock is released when the backend is dropped.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// If the file exists, it is opened for reading and appending.
    /// If it doesn't exist, a new empty file is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
        })
    }

    /// Acquires an advisory exclusive lock on the underlying file.
    ///
    /// The lock is released when this backend is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process already holds
    /// the lock.
    pub fn acquire_lock(&self) -> StorageResult<()> {
        let file = self.file.read();
        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }
        Ok(())
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fsyncs the parent directory so a rename or removal is durable.
    #[cfg(unix)]
    fn sync_parent_dir(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent_dir(&self) -> StorageResult<()> {
        // NTFS journaling covers metadata durability on Windows.
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut file = self.file.write();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, *size
                ),
            )));
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }

    fn rewrite(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut file = self.file.write();
        let mut size = self.size.write();

        // Write the replacement image to a sibling temp file, sync it,
        // then rename over the original. The rename is the commit point.
        // The temp handle is locked before the rename: a lock follows the
        // inode across the rename, so the path is never observable without
        // a holder and a concurrent open can never win the new inode.
        let temp_path = self.path.with_extension("tmp");
        let mut temp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        temp.write_all(data)?;
        temp.sync_all()?;
        if temp.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }
        fs::rename(&temp_path, &self.path)?;

        // Dropping the old handle releases its lock with the old inode.
        *file = temp;
        *size = data.len() as u64;

        drop(file);
        drop(size);
        self.sync_parent_dir()?;

        Ok(())
    }
}
