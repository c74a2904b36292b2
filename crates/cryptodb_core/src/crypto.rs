//! Authenticated encryption using AES-256-GCM.
//!
//! Every persisted secret is a sealed box: `nonce (12) || ciphertext || tag
//! (16)`. Sealing always binds associated data so a sealed box cannot be
//! replayed under a different key name or record kind.

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Fixed overhead a sealed box adds over its plaintext.
pub const SEAL_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Encryption key for AES-256-GCM.
///
/// The key is zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generates a new random encryption key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this method, don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Seals and opens record payloads with the store key.
pub struct CryptoManager {
    cipher: Aes256Gcm,
}

impl CryptoManager {
    /// Creates a crypto manager with the given key.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        let key_array = GenericArray::from_slice(key.as_bytes());
        let cipher = Aes256Gcm::new(key_array);
        Self { cipher }
    }

    /// Seals plaintext under a fresh random nonce.
    ///
    /// The output format is `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
    /// The associated data is authenticated but not stored.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| Error::invalid_argument("payload too large to seal"))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend(ciphertext);

        Ok(sealed)
    }

    /// Opens a sealed box produced by [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] if the box is malformed, was
    /// sealed under a different key, the associated data differs, or any byte
    /// was modified.
    pub fn open(&self, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < SEAL_OVERHEAD {
            return Err(Error::authentication_failed("sealed box too short"));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| Error::authentication_failed("sealed box failed to authenticate"))
    }
}

impl std::fmt::Debug for CryptoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(byte: u8) -> CryptoManager {
        CryptoManager::new(&EncryptionKey::from_bytes([byte; KEY_SIZE]))
    }

    #[test]
    fn seal_and_open() {
        let crypto = manager(1);
        let sealed = crypto.seal(b"hello world", b"aad").unwrap();
        assert_eq!(sealed.len(), b"hello world".len() + SEAL_OVERHEAD);

        let opened = crypto.open(&sealed, b"aad").unwrap();
        assert_eq!(opened, b"hello world");
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = manager(1).seal(b"secret", b"").unwrap();
        assert!(matches!(
            manager(2).open(&sealed, b""),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn wrong_aad_fails() {
        let crypto = manager(1);
        let sealed = crypto.seal(b"secret", b"key-a").unwrap();
        assert!(matches!(
            crypto.open(&sealed, b"key-b"),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let crypto = manager(1);
        let mut sealed = crypto.seal(b"secret", b"").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            crypto.open(&sealed, b""),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn truncated_box_fails() {
        let crypto = manager(1);
        assert!(matches!(
            crypto.open(&[0u8; SEAL_OVERHEAD - 1], b""),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn nonces_are_fresh() {
        let crypto = manager(1);
        let a = crypto.seal(b"same", b"").unwrap();
        let b = crypto.seal(b"same", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let crypto = manager(1);
        let sealed = crypto.seal(b"", b"aad").unwrap();
        assert_eq!(crypto.open(&sealed, b"aad").unwrap(), b"");
    }
}
