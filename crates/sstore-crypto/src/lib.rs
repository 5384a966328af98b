//! sstore-crypto: at-rest encryption for stored artifacts
//!
//! Pipeline: plaintext → SHA-256 (tapped while reading) → AES-256-GCM seal → persist
//!
//! Artifact format:
//! ```text
//! <name>.enc     [12 bytes: random nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! <name>.sha256  64 lowercase hex chars of SHA-256(plaintext), no newline
//! ```
//!
//! Key provisioning:
//! ```text
//! STORAGE_KEY (exactly 32 bytes)      ─┐
//!                                      ├── EncryptionKey (256-bit) → ArtifactCipher
//! passphrase + salt ── Argon2id ───────┘
//! ```

pub mod cipher;
pub mod digest;
pub mod error;
pub mod kdf;
pub mod key;

pub use cipher::ArtifactCipher;
pub use digest::{sha256_hex, ChecksumHasher};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key_from_passphrase, KdfParams};
pub use key::EncryptionKey;

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;
