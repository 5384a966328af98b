//! Encryption & integrity engine: plaintext stream ⇄ sealed, checksummed artifact.
//!
//! Save: validate → read + hash (single pass) → seal → write `.enc` + `.sha256`
//! Load: validate → read `.enc` + `.sha256` → open → compare checksum → plaintext
//!
//! The checksum sidecar is checked after AEAD authentication and is required:
//! a missing sidecar fails the load.

use std::path::PathBuf;

use sstore_core::{SafeName, SstoreError, SstoreResult};
use sstore_crypto::{sha256_hex, ArtifactCipher, CryptoError, EncryptionKey};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::artifact::ArtifactStore;
use crate::locks::NameLocks;
use crate::tap::TapReader;

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Plaintext length in bytes
    pub bytes: u64,
    /// Hex SHA-256 of the plaintext, as written to the sidecar
    pub checksum: String,
}

#[derive(Debug)]
pub struct Engine {
    cipher: ArtifactCipher,
    store: ArtifactStore,
    locks: NameLocks,
}

impl Engine {
    /// Build an engine over `data_dir`, creating the directory if needed.
    ///
    /// The key is consumed; only the expanded cipher state is retained.
    pub async fn open(key: EncryptionKey, data_dir: impl Into<PathBuf>) -> SstoreResult<Self> {
        let store = ArtifactStore::open(data_dir).await?;
        Ok(Self::with_store(key, store))
    }

    pub fn with_store(key: EncryptionKey, store: ArtifactStore) -> Self {
        Self {
            cipher: ArtifactCipher::new(&key),
            store,
            locks: NameLocks::new(),
        }
    }

    /// Encrypt everything readable from `content` and persist it under `filename`.
    ///
    /// An invalid name fails before any disk access. A previous artifact with
    /// the same name is fully replaced.
    pub async fn save<R>(&self, filename: &str, content: R) -> SstoreResult<SaveReceipt>
    where
        R: AsyncRead + Unpin,
    {
        let name = SafeName::parse(filename)?;

        let mut tap = TapReader::new(content);
        let mut plaintext = Vec::new();
        tap.read_to_end(&mut plaintext).await?;
        let hasher = tap.into_hasher();
        let bytes = hasher.bytes();
        let checksum = hasher.finalize_hex();

        let sealed = self.cipher.seal(&plaintext).map_err(crypto_error)?;

        {
            let _guard = self.locks.write(&name).await;
            self.store.write_ciphertext(&name, &sealed).await?;
            self.store.write_checksum(&name, &checksum).await?;
        }

        debug!(name = %name, bytes, "artifact saved");
        Ok(SaveReceipt { bytes, checksum })
    }

    /// Decrypt and verify the artifact stored under `filename`.
    ///
    /// Plaintext is returned only after both the AEAD tag and the stored
    /// checksum check out.
    pub async fn load(&self, filename: &str) -> SstoreResult<Vec<u8>> {
        let name = SafeName::parse(filename)?;

        let (sealed, stored_checksum) = {
            let _guard = self.locks.read(&name).await;
            let sealed = self
                .store
                .read_ciphertext(&name)
                .await?
                .ok_or_else(|| SstoreError::NotFound(name.to_string()))?;
            // Resolved only after authentication, so a tampered artifact is
            // reported as such whatever state the sidecar is in.
            let checksum = self.store.read_checksum(&name).await;
            (sealed, checksum)
        };

        let plaintext = self.cipher.open(&sealed).map_err(|e| {
            warn!(name = %name, error = %e, "artifact failed authentication");
            crypto_error(e)
        })?;

        let Some(stored_checksum) = stored_checksum? else {
            warn!(name = %name, "checksum sidecar missing");
            return Err(SstoreError::Integrity("checksum file missing".into()));
        };

        if sha256_hex(&plaintext) != stored_checksum {
            warn!(name = %name, "checksum mismatch after decryption");
            return Err(SstoreError::Integrity("hash mismatch".into()));
        }

        debug!(name = %name, bytes = plaintext.len(), "artifact loaded");
        Ok(plaintext)
    }

    /// True iff `filename` is valid and its sealed artifact is present.
    /// The checksum sidecar is not consulted.
    pub async fn exists(&self, filename: &str) -> bool {
        match SafeName::parse(filename) {
            Ok(name) => self.store.ciphertext_exists(&name).await,
            Err(_) => false,
        }
    }
}

fn crypto_error(e: CryptoError) -> SstoreError {
    match e {
        CryptoError::Open | CryptoError::Malformed { .. } => SstoreError::Decryption(e.to_string()),
        CryptoError::KeyLength { .. } | CryptoError::Kdf(_) => SstoreError::CipherInit(e.to_string()),
        CryptoError::Rng(_) | CryptoError::Seal => SstoreError::Io(std::io::Error::other(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    const TEST_KEY: &[u8; 32] = b"12345678901234567890123456789012";

    async fn test_engine() -> (TempDir, Engine) {
        let tmp = tempfile::tempdir().unwrap();
        let engine = Engine::open(EncryptionKey::from_bytes(*TEST_KEY), tmp.path())
            .await
            .unwrap();
        (tmp, engine)
    }

    fn enc_path(tmp: &TempDir, name: &str) -> PathBuf {
        tmp.path().join(format!("{name}.enc"))
    }

    fn sum_path(tmp: &TempDir, name: &str) -> PathBuf {
        tmp.path().join(format!("{name}.sha256"))
    }

    #[tokio::test]
    async fn save_and_load_hello() {
        let (tmp, engine) = test_engine().await;
        let original = b"Hello, this is secret data that should be encrypted!";

        let receipt = engine.save("hello.txt", &original[..]).await.unwrap();
        assert_eq!(receipt.bytes, original.len() as u64);
        assert_eq!(receipt.checksum, sha256_hex(original));

        let stored = std::fs::read(enc_path(&tmp, "hello.txt")).unwrap();
        assert_ne!(stored, original);
        assert!(
            !stored.windows(original.len()).any(|w| w == original),
            "plaintext must not appear in the artifact"
        );

        let sidecar = std::fs::read_to_string(sum_path(&tmp, "hello.txt")).unwrap();
        assert_eq!(sidecar, receipt.checksum);
        assert_eq!(sidecar.len(), 64);

        let loaded = engine.load("hello.txt").await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn save_and_load_empty() {
        let (_tmp, engine) = test_engine().await;
        engine.save("empty.bin", &b""[..]).await.unwrap();
        assert_eq!(engine.load("empty.bin").await.unwrap(), b"");
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let (_tmp, engine) = test_engine().await;
        engine.save("doc.txt", &b"version one"[..]).await.unwrap();
        engine.save("doc.txt", &b"v2"[..]).await.unwrap();

        assert_eq!(engine.load("doc.txt").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let (_tmp, engine) = test_engine().await;
        let result = engine.load("ghost.txt").await;
        assert!(matches!(result, Err(SstoreError::NotFound(_))), "{result:?}");
    }

    #[tokio::test]
    async fn flipped_last_byte_fails_decryption() {
        let (tmp, engine) = test_engine().await;
        engine.save("a.txt", &b"X"[..]).await.unwrap();

        let path = enc_path(&tmp, "a.txt");
        let mut blob = std::fs::read(&path).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        std::fs::write(&path, blob).unwrap();

        let result = engine.load("a.txt").await;
        assert!(matches!(result, Err(SstoreError::Decryption(_))), "{result:?}");
    }

    #[tokio::test]
    async fn every_bit_flip_fails_decryption() {
        let (tmp, engine) = test_engine().await;
        engine.save("bits.txt", &b"short"[..]).await.unwrap();

        let path = enc_path(&tmp, "bits.txt");
        let pristine = std::fs::read(&path).unwrap();
        for idx in 0..pristine.len() {
            for bit in 0..8 {
                let mut blob = pristine.clone();
                blob[idx] ^= 1 << bit;
                std::fs::write(&path, &blob).unwrap();

                let result = engine.load("bits.txt").await;
                assert!(
                    matches!(result, Err(SstoreError::Decryption(_))),
                    "byte {idx} bit {bit}: {result:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn truncated_artifact_fails_decryption() {
        let (tmp, engine) = test_engine().await;
        engine.save("t.txt", &b"truncate me"[..]).await.unwrap();

        std::fs::write(enc_path(&tmp, "t.txt"), b"tiny").unwrap();
        let result = engine.load("t.txt").await;
        assert!(matches!(result, Err(SstoreError::Decryption(_))), "{result:?}");
    }

    #[tokio::test]
    async fn wrong_checksum_fails_integrity() {
        let (tmp, engine) = test_engine().await;
        engine.save("c.txt", &b"checksummed"[..]).await.unwrap();

        std::fs::write(sum_path(&tmp, "c.txt"), sha256_hex(b"something else")).unwrap();
        let result = engine.load("c.txt").await;
        assert!(matches!(result, Err(SstoreError::Integrity(_))), "{result:?}");
    }

    #[tokio::test]
    async fn checksum_with_trailing_newline_fails_integrity() {
        let (tmp, engine) = test_engine().await;
        engine.save("nl.txt", &b"exact match only"[..]).await.unwrap();

        let path = sum_path(&tmp, "nl.txt");
        let mut sidecar = std::fs::read_to_string(&path).unwrap();
        sidecar.push('\n');
        std::fs::write(&path, sidecar).unwrap();

        let result = engine.load("nl.txt").await;
        assert!(matches!(result, Err(SstoreError::Integrity(_))), "{result:?}");
    }

    #[tokio::test]
    async fn missing_checksum_fails_closed() {
        let (tmp, engine) = test_engine().await;
        engine.save("b.txt", &b"data"[..]).await.unwrap();

        std::fs::remove_file(sum_path(&tmp, "b.txt")).unwrap();
        let result = engine.load("b.txt").await;
        assert!(matches!(result, Err(SstoreError::Integrity(_))), "{result:?}");
    }

    #[tokio::test]
    async fn tampered_artifact_with_unreadable_sidecar_fails_decryption() {
        let (tmp, engine) = test_engine().await;
        engine.save("a.txt", &b"X"[..]).await.unwrap();

        let enc = enc_path(&tmp, "a.txt");
        let mut blob = std::fs::read(&enc).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        std::fs::write(&enc, blob).unwrap();
        let sum = sum_path(&tmp, "a.txt");
        std::fs::remove_file(&sum).unwrap();
        std::fs::create_dir(&sum).unwrap();

        let result = engine.load("a.txt").await;
        assert!(matches!(result, Err(SstoreError::Decryption(_))), "{result:?}");
    }

    #[tokio::test]
    async fn unreadable_sidecar_on_intact_artifact_is_io() {
        let (tmp, engine) = test_engine().await;
        engine.save("d.txt", &b"intact"[..]).await.unwrap();

        let sum = sum_path(&tmp, "d.txt");
        std::fs::remove_file(&sum).unwrap();
        std::fs::create_dir(&sum).unwrap();

        let result = engine.load("d.txt").await;
        assert!(matches!(result, Err(SstoreError::Io(_))), "{result:?}");
    }

    #[tokio::test]
    async fn wrong_key_fails_decryption() {
        let (tmp, engine) = test_engine().await;
        engine.save("k.txt", &b"keyed"[..]).await.unwrap();
        drop(engine);

        let other = Engine::open(EncryptionKey::generate(), tmp.path())
            .await
            .unwrap();
        let result = other.load("k.txt").await;
        assert!(matches!(result, Err(SstoreError::Decryption(_))), "{result:?}");
    }

    #[tokio::test]
    async fn successive_saves_use_fresh_nonces() {
        let (tmp, engine) = test_engine().await;

        engine.save("n.txt", &b"same plaintext"[..]).await.unwrap();
        let first = std::fs::read(enc_path(&tmp, "n.txt")).unwrap();
        engine.save("n.txt", &b"same plaintext"[..]).await.unwrap();
        let second = std::fs::read(enc_path(&tmp, "n.txt")).unwrap();

        assert_ne!(first[..12], second[..12]);
    }

    #[tokio::test]
    async fn invalid_name_never_touches_disk() {
        let (tmp, engine) = test_engine().await;

        for bad in ["../../etc/passwd", "", ".", "..", "a/b", "a\\b", "x<y"] {
            let result = engine.save(bad, &b"payload"[..]).await;
            assert!(
                matches!(result, Err(SstoreError::InvalidFilename(_))),
                "{bad:?}: {result:?}"
            );
            let result = engine.load(bad).await;
            assert!(
                matches!(result, Err(SstoreError::InvalidFilename(_))),
                "{bad:?}: {result:?}"
            );
            assert!(!engine.exists(bad).await);
        }

        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
        assert!(!tmp.path().parent().unwrap().join("etc/passwd.enc").exists());
    }

    #[tokio::test]
    async fn exists_tracks_ciphertext_only() {
        let (tmp, engine) = test_engine().await;
        assert!(!engine.exists("myfile.txt").await);

        engine.save("myfile.txt", &b"test"[..]).await.unwrap();
        assert!(engine.exists("myfile.txt").await);

        std::fs::remove_file(sum_path(&tmp, "myfile.txt")).unwrap();
        assert!(engine.exists("myfile.txt").await);
    }

    #[tokio::test]
    async fn reader_error_surfaces_as_io() {
        let (tmp, engine) = test_engine().await;
        let reader = tokio_test::io::Builder::new()
            .read(b"partial upload")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            ))
            .build();

        let result = engine.save("broken.txt", reader).await;
        assert!(matches!(result, Err(SstoreError::Io(_))), "{result:?}");
        assert!(!enc_path(&tmp, "broken.txt").exists());
        assert!(!sum_path(&tmp, "broken.txt").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_keep_pairs_consistent() {
        let (_tmp, engine) = test_engine().await;
        let engine = Arc::new(engine);

        let payloads: Vec<Vec<u8>> = (0..16u8).map(|i| vec![i; 1024 + i as usize]).collect();

        let mut tasks = Vec::new();
        for payload in payloads.clone() {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                engine.save("shared.bin", &payload[..]).await.unwrap();
                engine.load("shared.bin").await.unwrap()
            }));
        }

        for task in tasks {
            let loaded = task.await.unwrap();
            assert!(payloads.contains(&loaded));
        }
        let last = engine.load("shared.bin").await.unwrap();
        assert!(payloads.contains(&last));
    }

    #[tokio::test]
    async fn open_fails_when_data_dir_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let result = Engine::open(EncryptionKey::generate(), &file).await;
        assert!(matches!(result, Err(SstoreError::Io(_))));
    }

    mod proptest_suite {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn load_returns_exactly_what_was_saved(
                data in proptest::collection::vec(any::<u8>(), 0..=8192)
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let loaded = rt.block_on(async {
                    let (_tmp, engine) = test_engine().await;
                    engine.save("prop.bin", &data[..]).await.unwrap();
                    engine.load("prop.bin").await.unwrap()
                });
                prop_assert_eq!(loaded, data);
            }
        }
    }
}
