//! AES-256-GCM sealing of whole artifacts
//!
//! Sealed artifact format (binary):
//! ```text
//! [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! No associated data is bound. Every seal draws a fresh nonce from the OS
//! CSPRNG; nonces are never derived from a counter.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};

use crate::error::{CryptoError, CryptoResult};
use crate::key::EncryptionKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// An AEAD context bound to the storage key.
///
/// Immutable after construction; share it behind an `Arc` across tasks.
pub struct ArtifactCipher {
    aead: Aes256Gcm,
}

impl ArtifactCipher {
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            aead: Aes256Gcm::new(key.as_bytes().into()),
        }
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
    pub fn seal(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| CryptoError::Rng(e.to_string()))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::Seal)?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt and authenticate an artifact produced by [`seal`](Self::seal).
    ///
    /// Nothing is returned unless the tag verifies.
    pub fn open(&self, artifact: &[u8]) -> CryptoResult<Vec<u8>> {
        if artifact.len() < NONCE_SIZE {
            return Err(CryptoError::Malformed {
                len: artifact.len(),
                min: NONCE_SIZE,
            });
        }

        let (nonce_bytes, ciphertext) = artifact.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.aead
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Open)
    }
}

impl std::fmt::Debug for ArtifactCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCipher")
            .field("aead", &"AES-256-GCM")
            .finish()
    }
}

/// Sealed size for a plaintext of `len` bytes.
pub const fn sealed_len(len: usize) -> usize {
    NONCE_SIZE + len + TAG_SIZE
}
