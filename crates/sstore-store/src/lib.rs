//! sstore-store: encrypted artifact persistence over a local data directory

pub mod artifact;
pub mod engine;
pub mod locks;
pub mod tap;

pub use artifact::{ArtifactStore, CHECKSUM_EXT, CIPHERTEXT_EXT};
pub use engine::{Engine, SaveReceipt};
