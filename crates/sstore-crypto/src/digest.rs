//! SHA-256 checksum records for plaintext content

use sha2::{Digest, Sha256};

/// Incremental SHA-256 accumulator producing the checksum record format:
/// 64 lowercase hex characters.
#[derive(Debug, Clone, Default)]
pub struct ChecksumHasher {
    inner: Sha256,
    bytes: u64,
}

impl ChecksumHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes observed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// One-shot hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
