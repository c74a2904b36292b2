//! Secure store destruction.
//!
//! Destroying a store overwrites every byte with zeros, syncs the overwrite
//! to disk and only then unlinks the file. Uniqueness data is not required;
//! destruction is an ownership operation on the file, not a decryption.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;
use tracing::debug;

use crate::database::{canonical_store_path, is_path_open};
use crate::error::{Error, Result};
use crate::options::Options;

/// Destroys a store file using the process-wide default options.
///
/// # Errors
///
/// Returns [`Error::InUse`] if the store is open in this process or locked
/// by another one, and [`Error::Io`] if the file does not exist.
pub fn destroy(path: impl AsRef<Path>) -> Result<()> {
    destroy_with_options(path, &crate::database::default_options())
}

/// Destroys a store file with explicit options.
pub fn destroy_with_options(path: impl AsRef<Path>, options: &Options) -> Result<()> {
    let canonical = canonical_store_path(path.as_ref())?;
    if is_path_open(&canonical) {
        return Err(Error::InUse {
            path: canonical.clone(),
        });
    }

    let mut file = OpenOptions::new().read(true).write(true).open(&canonical)?;
    file.try_lock_exclusive().map_err(|_| Error::InUse {
        path: canonical.clone(),
    })?;

    let len = file.metadata()?.len();
    let chunk = vec![0u8; options.secure_destroy_chunk.max(1)];
    file.seek(SeekFrom::Start(0))?;
    let mut remaining = len;
    while remaining > 0 {
        let take = chunk.len().min(remaining as usize);
        file.write_all(&chunk[..take])?;
        remaining -= take as u64;
    }
    file.sync_all()?;
    drop(file);

    fs::remove_file(&canonical)?;
    sync_parent_dir(&canonical)?;
    debug!(path = %canonical.display(), bytes = len, "store destroyed");
    Ok(())
}

/// Makes the unlink itself durable.
fn sync_parent_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        fs::File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::kdf::UNIQ_DATA_LEN;
    use tempfile::TempDir;

    fn uniq(byte: u8) -> Vec<u8> {
        vec![byte; UNIQ_DATA_LEN]
    }

    #[test]
    fn destroy_removes_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doomed.cdb");
        {
            let db = Database::open(&path, &uniq(1)).unwrap();
            db.put_string("k", "v").unwrap();
            db.close().unwrap();
        }

        destroy(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn destroyed_store_cannot_be_reopened_with_old_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doomed.cdb");
        {
            let db = Database::open(&path, &uniq(1)).unwrap();
            db.put_string("k", "v").unwrap();
            db.close().unwrap();
        }
        destroy(&path).unwrap();

        // Reopening creates a brand new store with a fresh salt
        let db = Database::open(&path, &uniq(1)).unwrap();
        assert!(matches!(
            db.get_string("k", 64),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn destroy_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never-existed.cdb");
        assert!(matches!(destroy(&path), Err(Error::Io(_))));
    }

    #[test]
    fn destroy_open_store_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("busy.cdb");
        let db = Database::open(&path, &uniq(1)).unwrap();

        assert!(matches!(destroy(&path), Err(Error::InUse { .. })));
        assert!(path.exists());
        assert!(db.is_open());

        db.close().unwrap();
        destroy(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn small_chunk_size_still_wipes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny-chunks.cdb");
        {
            let db = Database::open(&path, &uniq(1)).unwrap();
            db.put_string("k", "a long enough value to span chunks").unwrap();
            db.close().unwrap();
        }

        destroy_with_options(&path, &Options::new().secure_destroy_chunk(3)).unwrap();
        assert!(!path.exists());
    }
}
