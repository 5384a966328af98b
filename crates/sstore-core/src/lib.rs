pub mod config;
pub mod error;
pub mod filename;

pub use error::{SstoreError, SstoreResult};
pub use filename::{validate, FilenameError, SafeName};
