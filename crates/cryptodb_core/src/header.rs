//! Store file header.
//!
//! The header is the first [`HEADER_LEN`] bytes of every store file:
//!
//! ```text
//! magic "CKDB" (4) | format version u16 LE (2) | salt (16) | verifier (36)
//! ```
//!
//! The verifier is a sealed box over a fixed plaintext, with the preceding
//! magic, version and salt as associated data. Opening it proves both that
//! the derived key is right and that the header fields were not altered.

use rand::RngCore;

use crate::crypto::{CryptoManager, SEAL_OVERHEAD};
use crate::error::{Error, Result};

/// File magic identifying a CryptoDB store.
pub const MAGIC: [u8; 4] = *b"CKDB";

/// On-disk format version written by this crate.
pub const FORMAT_VERSION: u16 = 1;

/// Byte length of the key derivation salt.
pub const SALT_LEN: usize = 16;

/// Plaintext sealed into the header verifier.
const VERIFIER_PLAINTEXT: &[u8] = b"cryptodb";

/// Length of the authenticated prefix (magic, version, salt).
const PREFIX_LEN: usize = 4 + 2 + SALT_LEN;

/// Total header length in bytes.
pub const HEADER_LEN: usize = PREFIX_LEN + VERIFIER_PLAINTEXT.len() + SEAL_OVERHEAD;

/// Parsed store header.
#[derive(Debug, Clone)]
pub struct Header {
    /// Key derivation salt, unique per store file.
    pub salt: [u8; SALT_LEN],
}

impl Header {
    /// Creates a header with a fresh random salt.
    #[must_use]
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self { salt }
    }

    /// Parses the header prefix without authenticating it.
    ///
    /// Authentication needs the derived key, which in turn needs the salt
    /// read here. Callers must follow up with [`verify`](Self::verify).
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::authentication_failed("store header is truncated"));
        }
        if bytes[..4] != MAGIC {
            return Err(Error::authentication_failed("bad store magic"));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(Error::authentication_failed(format!(
                "unsupported format version {version}"
            )));
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[6..PREFIX_LEN]);
        Ok(Self { salt })
    }

    /// Authenticates the header verifier with the derived key.
    pub fn verify(bytes: &[u8], crypto: &CryptoManager) -> Result<()> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::authentication_failed("store header is truncated"));
        }

        let plaintext = crypto.open(&bytes[PREFIX_LEN..HEADER_LEN], &bytes[..PREFIX_LEN])?;
        if plaintext != VERIFIER_PLAINTEXT {
            return Err(Error::authentication_failed("header verifier mismatch"));
        }
        Ok(())
    }

    /// Encodes the header, sealing a fresh verifier with the derived key.
    pub fn encode(&self, crypto: &CryptoManager) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(HEADER_LEN);
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&self.salt);

        let verifier = crypto.seal(VERIFIER_PLAINTEXT, &bytes)?;
        bytes.extend(verifier);

        debug_assert_eq!(bytes.len(), HEADER_LEN);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{EncryptionKey, KEY_SIZE};

    fn manager(byte: u8) -> CryptoManager {
        CryptoManager::new(&EncryptionKey::from_bytes([byte; KEY_SIZE]))
    }

    #[test]
    fn encode_parse_verify() {
        let crypto = manager(9);
        let header = Header::generate();
        let bytes = header.encode(&crypto).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);

        let parsed = Header::parse(&bytes).unwrap();
        assert_eq!(parsed.salt, header.salt);
        Header::verify(&bytes, &crypto).unwrap();
    }

    #[test]
    fn wrong_key_fails_verification() {
        let bytes = Header::generate().encode(&manager(1)).unwrap();
        assert!(matches!(
            Header::verify(&bytes, &manager(2)),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn rejects_bad_magic() {
        let crypto = manager(1);
        let mut bytes = Header::generate().encode(&crypto).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            Header::parse(&bytes),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let crypto = manager(1);
        let mut bytes = Header::generate().encode(&crypto).unwrap();
        bytes[4] = 0xFF;
        assert!(matches!(
            Header::parse(&bytes),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn tampered_salt_fails_verification() {
        let crypto = manager(1);
        let mut bytes = Header::generate().encode(&crypto).unwrap();
        bytes[6] ^= 0x01;
        assert!(matches!(
            Header::verify(&bytes, &crypto),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn rejects_short_input() {
        assert!(matches!(
            Header::parse(&[0u8; HEADER_LEN - 1]),
            Err(Error::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn salts_are_unique() {
        assert_ne!(Header::generate().salt, Header::generate().salt);
    }
}
