//! Key derivation from caller-supplied uniqueness data.
//!
//! A store key never touches the disk. It is re-derived on every open from
//! the caller's uniqueness data and the per-store salt held in the header,
//! using HKDF-SHA256.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::crypto::{EncryptionKey, KEY_SIZE};
use crate::error::{Error, Result};
use crate::header::SALT_LEN;

/// Required byte length of the uniqueness data supplied at open.
pub const UNIQ_DATA_LEN: usize = 512;

/// Application context string bound into the derivation.
const KDF_INFO: &[u8] = b"cryptodb-record-key-v1";

/// Derives the store encryption key from uniqueness data and the header salt.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the uniqueness data is not exactly
/// [`UNIQ_DATA_LEN`] bytes.
pub fn derive_store_key(uniq_data: &[u8], salt: &[u8; SALT_LEN]) -> Result<EncryptionKey> {
    if uniq_data.len() != UNIQ_DATA_LEN {
        return Err(Error::invalid_argument(format!(
            "uniqueness data must be exactly {UNIQ_DATA_LEN} bytes, got {}",
            uniq_data.len()
        )));
    }

    let hk = Hkdf::<Sha256>::new(Some(salt), uniq_data);
    let mut bytes = [0u8; KEY_SIZE];
    hk.expand(KDF_INFO, &mut bytes)
        .map_err(|_| Error::invalid_argument("HKDF expand failed"))?;

    Ok(EncryptionKey::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniq(byte: u8) -> Vec<u8> {
        vec![byte; UNIQ_DATA_LEN]
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_store_key(&uniq(0xAB), &salt).unwrap();
        let b = derive_store_key(&uniq(0xAB), &salt).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_uniq_data_gives_different_key() {
        let salt = [7u8; SALT_LEN];
        let a = derive_store_key(&uniq(0xAB), &salt).unwrap();
        let b = derive_store_key(&uniq(0xAC), &salt).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_salt_gives_different_key() {
        let a = derive_store_key(&uniq(0xAB), &[1u8; SALT_LEN]).unwrap();
        let b = derive_store_key(&uniq(0xAB), &[2u8; SALT_LEN]).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn rejects_wrong_length() {
        let salt = [0u8; SALT_LEN];
        assert!(matches!(
            derive_store_key(&[0u8; 511], &salt),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            derive_store_key(&[0u8; 513], &salt),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            derive_store_key(&[], &salt),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn single_bit_flip_diverges() {
        let salt = [0u8; SALT_LEN];
        let mut data = uniq(0);
        let a = derive_store_key(&data, &salt).unwrap();
        data[511] ^= 0x01;
        let b = derive_store_key(&data, &salt).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
