//! Database handle and lifecycle.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use cryptodb_codec::{decode_value, encode_value, Value, ValueType};
use cryptodb_storage::{FileBackend, StorageBackend, StorageError};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::crypto::{CryptoManager, EncryptionKey};
use crate::error::{Error, Result};
use crate::header::{Header, HEADER_LEN, SALT_LEN};
use crate::kdf::{self, UNIQ_DATA_LEN};
use crate::options::Options;
use crate::record::{seal_aad, Record, MAX_KEY_LEN};
use crate::store::RecordStore;

/// Canonical paths of stores currently open in this process.
static OPEN_PATHS: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

/// Process-wide default options used by [`Database::open`].
static DEFAULT_OPTIONS: RwLock<Options> = RwLock::new(Options::BUILTIN);

/// Replaces the process-wide default open options.
pub fn set_default_options(options: Options) {
    *DEFAULT_OPTIONS.write() = options;
}

/// Returns a copy of the process-wide default open options.
#[must_use]
pub fn default_options() -> Options {
    DEFAULT_OPTIONS.read().clone()
}

/// Resolves a store path to its canonical form.
///
/// The file itself may not exist yet, so only the parent directory is
/// canonicalized.
pub(crate) fn canonical_store_path(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::invalid_argument("store path has no file name"))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Ok(parent.canonicalize()?.join(file_name))
}

/// Returns whether a canonical path is registered as open in this process.
pub(crate) fn is_path_open(canonical: &Path) -> bool {
    OPEN_PATHS.lock().contains(canonical)
}

struct Inner {
    store: RecordStore,
    crypto: CryptoManager,
}

/// Where the store key comes from at open time.
enum KeyMaterial<'a> {
    /// Derive the key from uniqueness data and the header salt.
    Derive(&'a [u8]),
    /// Use a ready key as-is, bypassing derivation.
    Provided(EncryptionKey),
}

impl KeyMaterial<'_> {
    fn resolve(self, salt: &[u8; SALT_LEN]) -> Result<EncryptionKey> {
        match self {
            Self::Derive(uniq_data) => kdf::derive_store_key(uniq_data, salt),
            Self::Provided(key) => Ok(key),
        }
    }
}

/// An open CryptoDB store.
///
/// All values are sealed with a key derived from the uniqueness data given
/// at open; the key never reaches the disk and is erased from memory when
/// the handle is closed or dropped.
///
/// A handle is safe to share across threads. Mutations are serialized
/// internally; reads proceed concurrently.
pub struct Database {
    options: Options,
    /// Canonical path held in [`OPEN_PATHS`], absent for in-memory stores.
    registered_path: Option<PathBuf>,
    inner: RwLock<Option<Inner>>,
}

impl Database {
    /// Opens or creates a store file using the process-wide default options.
    ///
    /// `uniq_data` must be exactly [`UNIQ_DATA_LEN`] bytes of caller-managed
    /// secret material. Opening an existing store with different uniqueness
    /// data fails with [`Error::AuthenticationFailed`].
    pub fn open(path: impl AsRef<Path>, uniq_data: &[u8]) -> Result<Self> {
        Self::open_with_options(path, uniq_data, default_options())
    }

    /// Opens or creates a store file with explicit options.
    pub fn open_with_options(
        path: impl AsRef<Path>,
        uniq_data: &[u8],
        options: Options,
    ) -> Result<Self> {
        if uniq_data.len() != UNIQ_DATA_LEN {
            return Err(Error::invalid_argument(format!(
                "uniqueness data must be exactly {UNIQ_DATA_LEN} bytes, got {}",
                uniq_data.len()
            )));
        }
        Self::open_file(path.as_ref(), KeyMaterial::Derive(uniq_data), options)
    }

    /// Opens or creates a store file with a ready encryption key, bypassing
    /// key derivation.
    ///
    /// For callers that manage key material themselves (a hardware token, an
    /// external KDF). The header salt is still generated and stored but the
    /// key is used as-is; opening an existing store with a different key
    /// fails with [`Error::AuthenticationFailed`].
    pub fn open_with_key(path: impl AsRef<Path>, key: EncryptionKey) -> Result<Self> {
        Self::open_with_key_options(path, key, default_options())
    }

    /// Opens or creates a store file with a ready encryption key and
    /// explicit options.
    pub fn open_with_key_options(
        path: impl AsRef<Path>,
        key: EncryptionKey,
        options: Options,
    ) -> Result<Self> {
        Self::open_file(path.as_ref(), KeyMaterial::Provided(key), options)
    }

    fn open_file(path: &Path, material: KeyMaterial<'_>, options: Options) -> Result<Self> {
        let canonical = canonical_store_path(path)?;
        {
            let mut open_paths = OPEN_PATHS.lock();
            if !open_paths.insert(canonical.clone()) {
                return Err(Error::AlreadyOpen { path: canonical });
            }
        }

        match Self::open_file_store(&canonical, material, &options) {
            Ok(inner) => {
                debug!(path = %canonical.display(), keys = inner.store.len(), "store opened");
                Ok(Self {
                    options,
                    registered_path: Some(canonical),
                    inner: RwLock::new(Some(inner)),
                })
            }
            Err(err) => {
                OPEN_PATHS.lock().remove(&canonical);
                Err(err)
            }
        }
    }

    /// Opens a store over a caller-supplied backend.
    ///
    /// No cross-handle exclusion is performed; the caller owns the backend's
    /// lifecycle.
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        uniq_data: &[u8],
        options: Options,
    ) -> Result<Self> {
        if uniq_data.len() != UNIQ_DATA_LEN {
            return Err(Error::invalid_argument(format!(
                "uniqueness data must be exactly {UNIQ_DATA_LEN} bytes, got {}",
                uniq_data.len()
            )));
        }
        let inner = Self::init_store(backend, KeyMaterial::Derive(uniq_data), &options)?;
        Ok(Self {
            options,
            registered_path: None,
            inner: RwLock::new(Some(inner)),
        })
    }

    /// Opens an empty in-memory store, useful for tests and caches.
    pub fn open_in_memory(uniq_data: &[u8]) -> Result<Self> {
        Self::open_with_backend(
            Box::new(cryptodb_storage::InMemoryBackend::new()),
            uniq_data,
            default_options(),
        )
    }

    fn open_file_store(
        canonical: &Path,
        material: KeyMaterial<'_>,
        options: &Options,
    ) -> Result<Inner> {
        let backend = FileBackend::open(canonical)?;
        backend.acquire_lock().map_err(|err| match err {
            StorageError::Locked => Error::InUse {
                path: canonical.to_path_buf(),
            },
            other => Error::Storage(other),
        })?;
        Self::init_store(Box::new(backend), material, options)
    }

    fn init_store(
        mut backend: Box<dyn StorageBackend>,
        material: KeyMaterial<'_>,
        options: &Options,
    ) -> Result<Inner> {
        let size = backend.size()?;
        let crypto = if size == 0 {
            let header = Header::generate();
            let key = material.resolve(&header.salt)?;
            let crypto = CryptoManager::new(&key);
            let bytes = header.encode(&crypto)?;
            backend.append(&bytes)?;
            backend.flush()?;
            backend.sync()?;
            crypto
        } else {
            if size < HEADER_LEN as u64 {
                return Err(Error::authentication_failed("store file too short"));
            }
            let bytes = backend.read_at(0, HEADER_LEN)?;
            let header = Header::parse(&bytes)?;
            let key = material.resolve(&header.salt)?;
            let crypto = CryptoManager::new(&key);
            Header::verify(&bytes, &crypto)?;
            crypto
        };

        let store = RecordStore::new(backend);
        store.rebuild_index()?;
        if store.garbage_ratio()? > options.compact_on_open_ratio {
            store.compact()?;
        }
        Ok(Inner { store, crypto })
    }

    /// Stores a string value under a key, replacing any previous value.
    pub fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.put_value(key, Value::String(value.to_string()))
    }

    /// Stores a signed 64-bit integer under a key.
    pub fn put_integer(&self, key: &str, value: i64) -> Result<()> {
        self.put_value(key, Value::Integer(value))
    }

    /// Stores a 64-bit float under a key. The bit pattern is preserved
    /// exactly, including NaN payloads.
    pub fn put_double(&self, key: &str, value: f64) -> Result<()> {
        self.put_value(key, Value::Double(value))
    }

    /// Retrieves a string value.
    ///
    /// `max_len` is a hard ceiling on the stored string's byte length; a
    /// longer value fails with [`Error::LengthExceeded`] rather than being
    /// truncated.
    pub fn get_string(&self, key: &str, max_len: usize) -> Result<String> {
        if max_len == 0 {
            return Err(Error::invalid_argument("max_len must be non-zero"));
        }
        match self.get_value(key, ValueType::String)? {
            Value::String(s) => {
                if s.len() > max_len {
                    return Err(Error::LengthExceeded {
                        len: s.len(),
                        max_len,
                    });
                }
                Ok(s)
            }
            _ => unreachable!("get_value returned wrong variant"),
        }
    }

    /// Retrieves an integer value.
    pub fn get_integer(&self, key: &str) -> Result<i64> {
        match self.get_value(key, ValueType::Integer)? {
            Value::Integer(v) => Ok(v),
            _ => unreachable!("get_value returned wrong variant"),
        }
    }

    /// Retrieves a double value.
    pub fn get_double(&self, key: &str) -> Result<f64> {
        match self.get_value(key, ValueType::Double)? {
            Value::Double(v) => Ok(v),
            _ => unreachable!("get_value returned wrong variant"),
        }
    }

    /// Deletes a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the key does not exist.
    pub fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotOpen)?;
        inner.store.delete(key, self.options.sync_on_put)
    }

    /// Rewrites the store to drop superseded records and tombstones.
    pub fn compact(&self) -> Result<()> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotOpen)?;
        inner.store.compact()
    }

    /// Flushes and fsyncs pending writes.
    pub fn flush(&self) -> Result<()> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotOpen)?;
        inner.store.sync()
    }

    /// Number of live keys.
    pub fn len(&self) -> Result<usize> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotOpen)?;
        Ok(inner.store.len())
    }

    /// Returns true if the store holds no live keys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns whether this handle is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Canonical path of the store file, absent for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.registered_path.as_deref()
    }

    /// Closes the store, syncing pending writes and erasing key material.
    ///
    /// Closing an already closed handle is a no-op. The file lock and the
    /// in-process registration are released even if the final sync fails.
    pub fn close(&self) -> Result<()> {
        let taken = self.inner.write().take();
        let Some(inner) = taken else {
            return Ok(());
        };

        let sync_result = inner.store.sync();
        // Dropping Inner releases the file lock and zeroizes the key
        drop(inner);
        if let Some(path) = &self.registered_path {
            OPEN_PATHS.lock().remove(path);
            debug!(path = %path.display(), "store closed");
        }
        sync_result
    }

    fn put_value(&self, key: &str, value: Value) -> Result<()> {
        validate_key(key)?;
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotOpen)?;

        let value_type = value.value_type();
        let body = encode_value(&value)?;
        let sealed = inner.crypto.seal(&body, &seal_aad(value_type, key))?;
        inner.store.append(
            &Record::Put {
                key: key.to_string(),
                value_type,
                sealed,
            },
            self.options.sync_on_put,
        )
    }

    fn get_value(&self, key: &str, requested: ValueType) -> Result<Value> {
        validate_key(key)?;
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(Error::NotOpen)?;

        match inner.store.get(key)? {
            Record::Put {
                key,
                value_type,
                sealed,
            } => {
                // Authenticate before the type check so tampering is never
                // reported as a mere mismatch
                let body = inner.crypto.open(&sealed, &seal_aad(value_type, &key))?;
                if value_type != requested {
                    return Err(Error::TypeMismatch {
                        stored: value_type,
                        requested,
                    });
                }
                Ok(decode_value(value_type, &body)?)
            }
            Record::Tombstone { key } => Err(Error::not_found(key)),
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_argument("key must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::invalid_argument(format!(
            "key is {} bytes, maximum is {MAX_KEY_LEN}",
            key.len()
        )));
    }
    Ok(())
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.registered_path)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
