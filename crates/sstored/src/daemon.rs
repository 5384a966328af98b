//! Daemon lifecycle: key provisioning, store/limiter startup, HTTP serve, shutdown

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sstore_core::config::{CryptoConfig, KeySource, SstoreConfig};
use sstore_core::{SstoreError, SstoreResult};
use sstore_crypto::{derive_key_from_passphrase, EncryptionKey, KdfParams};
use sstore_limiter::{spawn_sweeper, RateLimiter};
use sstore_store::Engine;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::http::{router, AppState};
use crate::metrics::Metrics;

pub async fn run(config: SstoreConfig) -> Result<()> {
    info!("daemon starting");

    config.limiter.check()?;

    // A missing or malformed key is fatal: nothing can be stored or served.
    let key = load_key(&config.crypto)?;
    let engine = Engine::open(key, &config.storage.data_dir)
        .await
        .with_context(|| format!("opening data dir {}", config.storage.data_dir.display()))?;
    info!(data_dir = %config.storage.data_dir.display(), "artifact store ready");

    let limiter = Arc::new(RateLimiter::system(config.limiter.clone()));
    let cancel = CancellationToken::new();
    let sweeper = if config.limiter.enabled {
        info!(
            capacity = config.limiter.capacity,
            refill_per_sec = config.limiter.refill_per_sec,
            sweep_mode = ?config.limiter.sweep_mode,
            "rate limiter enabled"
        );
        Some(spawn_sweeper(
            limiter.clone(),
            Duration::from_secs(config.limiter.sweep_interval_secs),
            cancel.clone(),
        ))
    } else {
        warn!("rate limiter disabled");
        None
    };

    let state = AppState {
        engine: Arc::new(engine),
        limiter,
        metrics: Arc::new(Metrics::new()),
    };
    let app = router(state, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("binding {}", config.server.listen))?;
    info!(listen = %config.server.listen, "HTTP: listening");

    notify_ready();

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    cancel.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!("limiter sweeper join failed: {e}");
        }
    }

    served.context("HTTP server")?;
    info!("daemon exiting cleanly");
    Ok(())
}

/// Read the process secret from `crypto.key_env` and turn it into the storage key.
fn load_key(crypto: &CryptoConfig) -> SstoreResult<EncryptionKey> {
    let secret = std::env::var(&crypto.key_env).map_err(|_| {
        SstoreError::CipherInit(format!("{} environment variable is not set", crypto.key_env))
    })?;
    key_from_secret(&SecretString::from(secret), crypto)
}

fn key_from_secret(secret: &SecretString, crypto: &CryptoConfig) -> SstoreResult<EncryptionKey> {
    let key = match crypto.key_source {
        KeySource::Raw => EncryptionKey::from_slice(secret.expose_secret().as_bytes()),
        KeySource::Passphrase => {
            let salt = crypto.kdf_salt.as_deref().ok_or_else(|| {
                SstoreError::CipherInit("crypto.kdf_salt is required for passphrase keys".into())
            })?;
            let params = KdfParams {
                mem_cost_kib: crypto.argon2_mem_cost_kib,
                time_cost: crypto.argon2_time_cost,
                parallelism: crypto.argon2_parallelism,
            };
            derive_key_from_passphrase(secret, salt.as_bytes(), &params)
        }
    };
    key.map_err(|e| SstoreError::CipherInit(format!("{} is unusable: {e}", crypto.key_env)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("registering SIGINT handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("registering SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, draining connections"),
        _ = terminate => info!("received SIGTERM, draining connections"),
    }
}

fn notify_ready() {
    // sd_notify(READY=1) via $NOTIFY_SOCKET; no-op outside systemd
    #[cfg(unix)]
    if let Ok(socket) = std::env::var("NOTIFY_SOCKET") {
        use std::os::unix::net::UnixDatagram;
        if let Ok(sock) = UnixDatagram::unbound() {
            let _ = sock.send_to(b"READY=1\n", &socket);
            tracing::debug!(notify_socket = %socket, "sent systemd READY=1");
        }
    }
}
