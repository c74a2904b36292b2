//! Append-only record store with an in-memory key index.
//!
//! The store owns the storage backend and the index mapping each live key to
//! the file offset of its newest record. The index is rebuilt on open by a
//! forward scan; a damaged tail is truncated away so a crash mid-append can
//! never surface a partial record.
//!
//! Lock order is backend before index, everywhere.

use std::collections::HashMap;

use cryptodb_storage::StorageBackend;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::header::HEADER_LEN;
use crate::record::{Record, MIN_RECORD_LEN};

/// Location of a key's newest record in the file.
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u64,
    len: u32,
}

#[derive(Debug, Default)]
struct IndexState {
    map: HashMap<String, IndexEntry>,
    /// Bytes of superseded records and tombstones, reclaimable by compaction.
    garbage_bytes: u64,
}

/// Record log plus key index over a storage backend.
pub struct RecordStore {
    backend: RwLock<Box<dyn StorageBackend>>,
    state: RwLock<IndexState>,
}

impl RecordStore {
    /// Creates a store over a backend. Call [`rebuild_index`](Self::rebuild_index)
    /// before serving reads.
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: RwLock::new(backend),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Scans the log and rebuilds the key index.
    ///
    /// Later records win over earlier ones and tombstones remove keys. The
    /// scan stops at the first structurally damaged record, which is treated
    /// as a torn tail and truncated away.
    pub fn rebuild_index(&self) -> Result<()> {
        let mut backend = self.backend.write();
        let mut state = self.state.write();
        state.map.clear();
        state.garbage_bytes = 0;

        let size = backend.size()?;
        let mut offset = HEADER_LEN as u64;

        while offset < size {
            match Self::read_record_at(backend.as_ref(), offset, size) {
                Ok((record, record_len)) => {
                    match record {
                        Record::Put { key, .. } => {
                            if let Some(old) = state.map.insert(
                                key,
                                IndexEntry {
                                    offset,
                                    len: record_len,
                                },
                            ) {
                                state.garbage_bytes += u64::from(old.len);
                            }
                        }
                        Record::Tombstone { key } => {
                            if let Some(old) = state.map.remove(&key) {
                                state.garbage_bytes += u64::from(old.len);
                            }
                            state.garbage_bytes += u64::from(record_len);
                        }
                    }
                    offset += u64::from(record_len);
                }
                Err(err) => {
                    warn!(
                        offset,
                        size,
                        %err,
                        "damaged record tail, truncating store"
                    );
                    backend.truncate(offset)?;
                    backend.sync()?;
                    break;
                }
            }
        }

        debug!(keys = state.map.len(), garbage = state.garbage_bytes, "index rebuilt");
        Ok(())
    }

    fn read_record_at(
        backend: &dyn StorageBackend,
        offset: u64,
        size: u64,
    ) -> Result<(Record, u32)> {
        if offset + 4 > size {
            return Err(Error::authentication_failed("truncated record length"));
        }
        let len_bytes = backend.read_at(offset, 4)?;
        let record_len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
        if (record_len as usize) < MIN_RECORD_LEN || offset + u64::from(record_len) > size {
            return Err(Error::authentication_failed(format!(
                "implausible record length {record_len}"
            )));
        }
        let bytes = backend.read_at(offset, record_len as usize)?;
        let record = Record::decode(&bytes)?;
        Ok((record, record_len))
    }

    /// Appends a record and updates the index.
    pub fn append(&self, record: &Record, sync: bool) -> Result<()> {
        let bytes = record.encode()?;
        let record_len = bytes.len() as u32;

        let mut backend = self.backend.write();
        let offset = Self::append_durable(&mut **backend, &bytes, sync)?;

        let mut state = self.state.write();
        match record {
            Record::Put { key, .. } => {
                if let Some(old) = state.map.insert(
                    key.clone(),
                    IndexEntry {
                        offset,
                        len: record_len,
                    },
                ) {
                    state.garbage_bytes += u64::from(old.len);
                }
            }
            Record::Tombstone { key } => {
                if let Some(old) = state.map.remove(key) {
                    state.garbage_bytes += u64::from(old.len);
                }
                state.garbage_bytes += u64::from(record_len);
            }
        }
        Ok(())
    }

    /// Appends bytes and makes them durable, rolling back on failure.
    ///
    /// A record whose flush or sync failed must not be replayable on the
    /// next open, so the bytes are truncated away before the error is
    /// propagated.
    fn append_durable(
        backend: &mut dyn StorageBackend,
        bytes: &[u8],
        sync: bool,
    ) -> Result<u64> {
        let offset = backend.append(bytes)?;

        let mut durable = backend.flush();
        if durable.is_ok() && sync {
            durable = backend.sync();
        }
        if let Err(err) = durable {
            let _ = backend.truncate(offset);
            return Err(err.into());
        }
        Ok(offset)
    }

    /// Appends a tombstone for a live key.
    ///
    /// The presence check and the append happen under one backend lock, so
    /// of two racing deletes exactly one succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the key is not live.
    pub fn delete(&self, key: &str, sync: bool) -> Result<()> {
        let record = Record::Tombstone {
            key: key.to_string(),
        };
        let bytes = record.encode()?;

        let mut backend = self.backend.write();
        if !self.state.read().map.contains_key(key) {
            return Err(Error::not_found(key));
        }
        Self::append_durable(&mut **backend, &bytes, sync)?;

        let mut state = self.state.write();
        if let Some(old) = state.map.remove(key) {
            state.garbage_bytes += u64::from(old.len);
        }
        state.garbage_bytes += bytes.len() as u64;
        Ok(())
    }

    /// Reads the newest record for a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown or deleted keys.
    pub fn get(&self, key: &str) -> Result<Record> {
        let backend = self.backend.read();
        let entry = {
            let state = self.state.read();
            *state.map.get(key).ok_or_else(|| Error::not_found(key))?
        };
        let bytes = backend.read_at(entry.offset, entry.len as usize)?;
        Record::decode(&bytes)
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let _backend = self.backend.read();
        self.state.read().map.len()
    }

    /// Returns true if no keys are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ratio of reclaimable bytes to total record bytes, in `0.0..=1.0`.
    pub fn garbage_ratio(&self) -> Result<f64> {
        let backend = self.backend.read();
        let state = self.state.read();
        let total = backend.size()?.saturating_sub(HEADER_LEN as u64);
        if total == 0 {
            return Ok(0.0);
        }
        Ok(state.garbage_bytes as f64 / total as f64)
    }

    /// Rewrites the store to contain only the header and live records.
    ///
    /// Relies on the backend's atomic rewrite, so a crash during compaction
    /// leaves either the old image or the new one.
    pub fn compact(&self) -> Result<()> {
        let mut backend = self.backend.write();
        let mut state = self.state.write();

        let header = backend.read_at(0, HEADER_LEN)?;

        let mut entries: Vec<(String, IndexEntry)> = state
            .map
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by_key(|(_, entry)| entry.offset);

        let mut image = header;
        let mut new_map = HashMap::with_capacity(entries.len());
        for (key, entry) in entries {
            let new_offset = image.len() as u64;
            let bytes = backend.read_at(entry.offset, entry.len as usize)?;
            image.extend_from_slice(&bytes);
            new_map.insert(
                key,
                IndexEntry {
                    offset: new_offset,
                    len: entry.len,
                },
            );
        }

        let reclaimed = state.garbage_bytes;
        backend.rewrite(&image)?;
        state.map = new_map;
        state.garbage_bytes = 0;
        debug!(reclaimed, size = image.len(), "store compacted");
        Ok(())
    }

    /// Flushes buffered writes.
    pub fn flush(&self) -> Result<()> {
        self.backend.write().flush()?;
        Ok(())
    }

    /// Flushes and fsyncs the backend.
    pub fn sync(&self) -> Result<()> {
        let mut backend = self.backend.write();
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    /// Total file size in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(self.backend.read().size()?)
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}
