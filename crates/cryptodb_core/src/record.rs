//! Log record types and serialization.
//!
//! A store file is the header followed by a sequence of records:
//!
//! ```text
//! record_len u32 LE | flags u8 | value type u8 | key_len u16 LE | key | sealed payload | crc32 LE
//! ```
//!
//! `record_len` counts the whole record including itself and the CRC, so a
//! forward scan can hop record to record. The CRC covers everything before
//! it. Tombstones carry flag bit 0, a zero type byte and no payload.

use cryptodb_codec::ValueType;

use crate::error::{Error, Result};

/// Flag bit marking a tombstone record.
const FLAG_TOMBSTONE: u8 = 0b0000_0001;

/// Type byte written for tombstones, which carry no value.
const TYPE_NONE: u8 = 0;

/// Maximum key length in bytes, bounded by the wire format's u16 field.
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Fixed prefix size: length, flags, type, key length.
const PREFIX_SIZE: usize = 4 + 1 + 1 + 2;

/// CRC trailer size.
const CRC_SIZE: usize = 4;

/// Smallest possible record (empty key, no payload).
pub const MIN_RECORD_LEN: usize = PREFIX_SIZE + CRC_SIZE;

/// A single append-only log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A key/value pair with the value sealed under the store key.
    Put {
        /// The key, stored in the clear and bound into the seal.
        key: String,
        /// Type of the sealed value.
        value_type: ValueType,
        /// Sealed value payload (`nonce || ciphertext || tag`).
        sealed: Vec<u8>,
    },
    /// A deletion marker for a key.
    Tombstone {
        /// The deleted key.
        key: String,
    },
}

impl Record {
    /// Returns the record's key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Tombstone { key } => key,
        }
    }

    /// Returns true for tombstone records.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone { .. })
    }

    /// Returns the total encoded length in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let payload_len = match self {
            Self::Put { sealed, .. } => sealed.len(),
            Self::Tombstone { .. } => 0,
        };
        PREFIX_SIZE + self.key().len() + payload_len + CRC_SIZE
    }

    /// Serializes the record to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the key is empty or exceeds
    /// [`MAX_KEY_LEN`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let key = self.key();
        if key.is_empty() {
            return Err(Error::invalid_argument("key must not be empty"));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(Error::invalid_argument(format!(
                "key is {} bytes, maximum is {MAX_KEY_LEN}",
                key.len()
            )));
        }

        let record_len = self.encoded_len();
        let len_field = u32::try_from(record_len)
            .map_err(|_| Error::invalid_argument("record too large to encode"))?;

        let mut buf = Vec::with_capacity(record_len);
        buf.extend_from_slice(&len_field.to_le_bytes());

        match self {
            Self::Put {
                key,
                value_type,
                sealed,
            } => {
                buf.push(0);
                buf.push(value_type.as_byte());
                buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
                buf.extend_from_slice(key.as_bytes());
                buf.extend_from_slice(sealed);
            }
            Self::Tombstone { key } => {
                buf.push(FLAG_TOMBSTONE);
                buf.push(TYPE_NONE);
                buf.extend_from_slice(&(key.len() as u16).to_le_bytes());
                buf.extend_from_slice(key.as_bytes());
            }
        }

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        debug_assert_eq!(buf.len(), record_len);
        Ok(buf)
    }

    /// Deserializes a record from exactly `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] on any structural damage:
    /// length mismatch, CRC failure, unknown flags or type, non-UTF-8 key.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_RECORD_LEN {
            return Err(Error::authentication_failed("record too short"));
        }

        let record_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if record_len != data.len() {
            return Err(Error::authentication_failed(format!(
                "record length mismatch: declared {record_len}, got {}",
                data.len()
            )));
        }

        let crc_offset = data.len() - CRC_SIZE;
        let stored_crc = u32::from_le_bytes([
            data[crc_offset],
            data[crc_offset + 1],
            data[crc_offset + 2],
            data[crc_offset + 3],
        ]);
        let computed_crc = compute_crc32(&data[..crc_offset]);
        if stored_crc != computed_crc {
            return Err(Error::authentication_failed(format!(
                "record checksum mismatch: expected {stored_crc:08x}, got {computed_crc:08x}"
            )));
        }

        let flags = data[4];
        let type_byte = data[5];
        let key_len = u16::from_le_bytes([data[6], data[7]]) as usize;
        if PREFIX_SIZE + key_len > crc_offset {
            return Err(Error::authentication_failed("key extends past record end"));
        }

        let key = std::str::from_utf8(&data[PREFIX_SIZE..PREFIX_SIZE + key_len])
            .map_err(|_| Error::authentication_failed("record key is not valid UTF-8"))?
            .to_string();
        if key.is_empty() {
            return Err(Error::authentication_failed("record key is empty"));
        }

        let payload = &data[PREFIX_SIZE + key_len..crc_offset];

        match flags {
            0 => {
                let value_type = ValueType::from_byte(type_byte).ok_or_else(|| {
                    Error::authentication_failed(format!("unknown value type byte {type_byte}"))
                })?;
                Ok(Self::Put {
                    key,
                    value_type,
                    sealed: payload.to_vec(),
                })
            }
            FLAG_TOMBSTONE => {
                if type_byte != TYPE_NONE || !payload.is_empty() {
                    return Err(Error::authentication_failed("malformed tombstone record"));
                }
                Ok(Self::Tombstone { key })
            }
            other => Err(Error::authentication_failed(format!(
                "unknown record flags {other:#04x}"
            ))),
        }
    }
}

/// Associated data binding a sealed value to its record identity.
///
/// Sealing the value under `flags || type || key` means a sealed payload
/// cannot be spliced onto a different key or re-labelled with another type
/// without failing authentication.
#[must_use]
pub fn seal_aad(value_type: ValueType, key: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(2 + key.len());
    aad.push(0);
    aad.push(value_type.as_byte());
    aad.extend_from_slice(key.as_bytes());
    aad
}

/// Computes CRC32 checksum for data.
pub fn compute_crc32(data: &[u8]) -> u32 {
    // IEEE polynomial, table built at compile time
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_roundtrip() {
        let record = Record::Put {
            key: "user:1".to_string(),
            value_type: ValueType::String,
            sealed: vec![1, 2, 3, 4, 5],
        };
        let bytes = record.encode().unwrap();
        assert_eq!(bytes.len(), record.encoded_len());
        assert_eq!(Record::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn tombstone_roundtrip() {
        let record = Record::Tombstone {
            key: "gone".to_string(),
        };
        let bytes = record.encode().unwrap();
        let decoded = Record::decode(&bytes).unwrap();
        assert!(decoded.is_tombstone());
        assert_eq!(decoded.key(), "gone");
    }

    #[test]
    fn rejects_empty_key() {
        let record = Record::Tombstone { key: String::new() };
        assert!(matches!(
            record.encode(),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn corrupted_byte_fails_crc() {
        let record = Record::Put {
            key: "k".to_string(),
            value_type: ValueType::Integer,
            sealed: vec![0xAA; 36],
        };
        let mut bytes = record.encode().unwrap();
        bytes[10] ^= 0x01;
        assert!(matches!(
            Record::decode(&bytes),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn truncated_record_is_rejected() {
        let record = Record::Put {
            key: "k".to_string(),
            value_type: ValueType::Double,
            sealed: vec![0xBB; 36],
        };
        let bytes = record.encode().unwrap();
        assert!(matches!(
            Record::decode(&bytes[..bytes.len() - 1]),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let record = Record::Tombstone {
            key: "k".to_string(),
        };
        let mut bytes = record.encode().unwrap();
        bytes[4] = 0b0000_0010;
        // Re-stamp the CRC so only the flags are wrong
        let crc_offset = bytes.len() - 4;
        let crc = compute_crc32(&bytes[..crc_offset]);
        bytes[crc_offset..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            Record::decode(&bytes),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn aad_differs_per_key_and_type() {
        assert_ne!(
            seal_aad(ValueType::String, "a"),
            seal_aad(ValueType::String, "b")
        );
        assert_ne!(
            seal_aad(ValueType::String, "a"),
            seal_aad(ValueType::Integer, "a")
        );
    }

    #[test]
    fn crc32_known_vector() {
        // "123456789" is the standard IEEE CRC32 check input
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }
}
