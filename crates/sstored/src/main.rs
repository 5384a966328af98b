//! sstored: SecureStore encrypted file storage daemon
//!
//! Usage:
//!   STORAGE_KEY=<32 bytes> sstored [--config /etc/sstore/config.toml] [--listen 0.0.0.0:8080 | --port 8080]
//!
//! Endpoints:
//!   POST /upload               multipart field "file"
//!   GET  /download/{filename}  decrypted content
//!   HEAD /download/{filename}  existence check
//!   GET  /health               liveness
//!   GET  /metrics              Prometheus text format

mod daemon;
mod http;
mod metrics;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sstore_core::config::SstoreConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "sstored", version, about = "SecureStore encrypted file storage daemon")]
struct Cli {
    /// Path to sstore.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SSTORE_CONFIG",
        default_value = "/etc/sstore/config.toml"
    )]
    config: PathBuf,

    /// HTTP listen address (overrides server.listen)
    #[arg(long, env = "SSTORE_LISTEN")]
    listen: Option<String>,

    /// Port to listen on all interfaces; ignored when --listen is given
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SSTORE_LOG", default_value = "info")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "SSTORE_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log, &cli.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "sstored starting"
    );

    let mut config = load_config(&cli.config).await?;
    if let Some(listen) = listen_override(cli.listen, cli.port) {
        config.server.listen = listen;
    }

    daemon::run(config).await
}

/// `--listen` wins over `--port`; a bare port binds every interface.
fn listen_override(listen: Option<String>, port: Option<u16>) -> Option<String> {
    listen.or_else(|| port.map(|p| format!("0.0.0.0:{p}")))
}

/// Read the TOML config at `path`. A missing file is not an error: the
/// daemon falls back to defaults so it can run from env vars alone.
async fn load_config(path: &Path) -> Result<SstoreConfig> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(SstoreConfig::default());
        }
        Err(e) => return Err(e).with_context(|| format!("reading config {}", path.display())),
    };
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
