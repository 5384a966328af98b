//! On-disk artifact layout for stored files.
//!
//! Each validated name `F` maps to two sibling files in the data directory:
//!
//! ```text
//! {data_dir}/F.enc      sealed bytes, mode 0600
//! {data_dir}/F.sha256   hex checksum of the plaintext, mode 0644
//! ```
//!
//! Files are written atomically (temp → rename), so a reader sees either the
//! previous or the new content of each file, never a torn write.

use std::io;
use std::path::{Path, PathBuf};

use sstore_core::SafeName;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const CIPHERTEXT_EXT: &str = "enc";
pub const CHECKSUM_EXT: &str = "sha256";

const CIPHERTEXT_MODE: u32 = 0o600;
const CHECKSUM_MODE: u32 = 0o644;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open the store at `dir`, creating the directory if needed and probing
    /// that it accepts writes.
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let meta = fs::metadata(&dir).await?;
        if !meta.is_dir() {
            return Err(io::Error::other(format!(
                "data path is not a directory: {}",
                dir.display()
            )));
        }

        let probe = dir.join(format!(".sstore-probe-{}", uuid::Uuid::new_v4()));
        fs::write(&probe, b"").await?;
        fs::remove_file(&probe).await?;

        Ok(ArtifactStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ciphertext_path(&self, name: &SafeName) -> PathBuf {
        self.dir.join(format!("{name}.{CIPHERTEXT_EXT}"))
    }

    pub fn checksum_path(&self, name: &SafeName) -> PathBuf {
        self.dir.join(format!("{name}.{CHECKSUM_EXT}"))
    }

    pub async fn write_ciphertext(&self, name: &SafeName, sealed: &[u8]) -> io::Result<()> {
        write_atomic(&self.ciphertext_path(name), sealed, CIPHERTEXT_MODE).await
    }

    pub async fn write_checksum(&self, name: &SafeName, checksum: &str) -> io::Result<()> {
        write_atomic(&self.checksum_path(name), checksum.as_bytes(), CHECKSUM_MODE).await
    }

    /// Sealed bytes for `name`, or `None` if no artifact exists.
    pub async fn read_ciphertext(&self, name: &SafeName) -> io::Result<Option<Vec<u8>>> {
        read_optional(&self.ciphertext_path(name)).await
    }

    /// Stored checksum for `name`, or `None` if the sidecar is missing.
    ///
    /// Bytes are returned as-is (no trimming); a malformed record simply
    /// fails the equality check later.
    pub async fn read_checksum(&self, name: &SafeName) -> io::Result<Option<String>> {
        Ok(read_optional(&self.checksum_path(name))
            .await?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
    }

    pub async fn ciphertext_exists(&self, name: &SafeName) -> bool {
        fs::metadata(self.ciphertext_path(name))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

async fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

async fn write_atomic(path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    if let Err(e) = write_new(&tmp, data, mode).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

async fn write_new(path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}
