//! Key derivation: Argon2id passphrase → storage key
//!
//! Lets operators provision a variable-length secret instead of a value that
//! must match the cipher's key size exactly.

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CryptoError, CryptoResult};
use crate::key::EncryptionKey;
use crate::KEY_SIZE;

/// Minimum salt length accepted for passphrase derivation
pub const MIN_SALT_LEN: usize = 16;

/// Argon2id parameters for KDF
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub mem_cost_kib: u32,
    /// Time cost / iterations
    pub time_cost: u32,
    /// Parallelism (lanes)
    pub parallelism: u32,
}

/// Derive a 256-bit storage key from a passphrase and salt using Argon2id.
///
/// The salt does not need to be secret but must stay fixed for the lifetime
/// of the data directory; a different salt yields a different key and every
/// existing artifact will fail to open.
pub fn derive_key_from_passphrase(
    passphrase: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> CryptoResult<EncryptionKey> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::Kdf(format!(
            "salt must be at least {MIN_SALT_LEN} bytes, got {}",
            salt.len()
        )));
    }
    if passphrase.expose_secret().is_empty() {
        return Err(CryptoError::Kdf("passphrase is empty".into()));
    }

    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::Kdf(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::Kdf(format!("Argon2id failed: {e}")))?;

    Ok(EncryptionKey::from_bytes(key))
}
