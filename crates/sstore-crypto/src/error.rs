use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key must be exactly {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("nonce generation failed: {0}")]
    Rng(String),

    #[error("encryption failed")]
    Seal,

    #[error("artifact too short: {len} bytes (minimum {min})")]
    Malformed { len: usize, min: usize },

    #[error("authentication failed: wrong key or corrupted data")]
    Open,
}
