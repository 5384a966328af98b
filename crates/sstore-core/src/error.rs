use thiserror::Error;

use crate::filename::FilenameError;

pub type SstoreResult<T> = Result<T, SstoreError>;

#[derive(Debug, Error)]
pub enum SstoreError {
    #[error("invalid filename: {0}")]
    InvalidFilename(#[from] FilenameError),

    #[error("cipher init error: {0}")]
    CipherInit(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("rate limit exceeded (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("config error: {0}")]
    Config(String),
}
