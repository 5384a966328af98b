use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level service configuration (loaded from sstore.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SstoreConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
    pub limiter: LimiterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listen address for the HTTP API (default: 0.0.0.0:8080)
    pub listen: String,
    /// Maximum accepted request body for uploads, in bytes (default: 10 MiB)
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `.enc` and `.sha256` artifacts (created if missing)
    pub data_dir: PathBuf,
}

/// How the process secret becomes the 256-bit storage key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// The secret is the key and must be exactly 32 bytes
    Raw,
    /// The secret is a passphrase stretched with Argon2id
    Passphrase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Environment variable holding the secret (default: STORAGE_KEY)
    pub key_env: String,
    /// Interpretation of the secret (default: raw)
    pub key_source: KeySource,
    /// Argon2id salt, required for `passphrase` (at least 16 bytes)
    pub kdf_salt: Option<String>,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

/// Upper bound for `sweep_interval_secs` and `idle_ttl_secs` (one day)
pub const MAX_SWEEP_SECS: u64 = 24 * 60 * 60;

/// What the periodic limiter sweep does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepMode {
    /// Evict buckets idle longer than `idle_ttl_secs`
    Idle,
    /// Drop every bucket at once
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Disable to admit every request
    pub enabled: bool,
    /// Bucket capacity (burst size, default: 3)
    pub capacity: u32,
    /// Tokens added per second (default: 1.0)
    pub refill_per_sec: f64,
    /// Period of the background sweep (default: 60)
    pub sweep_interval_secs: u64,
    /// Idle time after which a bucket is evicted (default: 180)
    pub idle_ttl_secs: u64,
    pub sweep_mode: SweepMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            max_upload_bytes: 10 << 20,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            key_env: "STORAGE_KEY".into(),
            key_source: KeySource::Raw,
            kdf_salt: None,
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 3,
            refill_per_sec: 1.0,
            sweep_interval_secs: 60,
            idle_ttl_secs: 180,
            sweep_mode: SweepMode::Idle,
        }
    }
}

impl LimiterConfig {
    /// Reject parameters the token bucket cannot work with.
    pub fn check(&self) -> crate::SstoreResult<()> {
        if self.capacity == 0 {
            return Err(crate::SstoreError::Config(
                "limiter.capacity must be at least 1".into(),
            ));
        }
        if !(self.refill_per_sec.is_finite() && self.refill_per_sec > 0.0) {
            return Err(crate::SstoreError::Config(format!(
                "limiter.refill_per_sec must be a positive number, got {}",
                self.refill_per_sec
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(crate::SstoreError::Config(
                "limiter.sweep_interval_secs must be at least 1".into(),
            ));
        }
        if self.sweep_interval_secs > MAX_SWEEP_SECS {
            return Err(crate::SstoreError::Config(format!(
                "limiter.sweep_interval_secs must be at most {MAX_SWEEP_SECS}, got {}",
                self.sweep_interval_secs
            )));
        }
        if self.idle_ttl_secs > MAX_SWEEP_SECS {
            return Err(crate::SstoreError::Config(format!(
                "limiter.idle_ttl_secs must be at most {MAX_SWEEP_SECS}, got {}",
                self.idle_ttl_secs
            )));
        }
        Ok(())
    }
}
