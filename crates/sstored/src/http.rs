//! HTTP surface: upload, download, existence check, health and metrics.
//!
//! Endpoints:
//!   POST /upload               multipart form, field "file" (filename taken from the part)
//!   GET  /download/{filename}  decrypted bytes as an attachment
//!   HEAD /download/{filename}  200 if stored, 404 otherwise
//!   GET  /health               liveness (not rate limited)
//!   GET  /metrics              Prometheus text format (not rate limited)
//!
//! Decryption and checksum failures share one client-facing message; the
//! specific failed check is only logged.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        ConnectInfo, DefaultBodyLimit, Multipart, Path, Request, State,
    },
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::TryStreamExt;
use serde::Serialize;
use sstore_core::SstoreError;
use sstore_limiter::RateLimiter;
use sstore_store::Engine;
use tokio_util::io::StreamReader;
use tracing::{error, info, warn};

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
}

/// Paths that bypass admission so probes and scrapes never spend client budget.
const UNLIMITED_PATHS: &[&str] = &["/health", "/metrics"];

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler).fallback(method_not_allowed))
        .route("/metrics", get(metrics_handler).fallback(method_not_allowed))
        .route("/upload", post(upload_handler).fallback(method_not_allowed))
        .route(
            "/download/{filename}",
            get(download_handler)
                .head(exists_handler)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// JSON response envelope
#[derive(Debug, Serialize)]
struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
}

impl Envelope {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            checksum: None,
        }
    }

    fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            checksum: None,
        }
    }
}

enum ApiError {
    /// Request-shape problem detected before reaching the engine
    Request(StatusCode, &'static str),
    Store(SstoreError),
}

impl From<SstoreError> for ApiError {
    fn from(e: SstoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Request(status, message) => (status, message),
            ApiError::Store(e) => match e {
                SstoreError::NotFound(_) => (StatusCode::NOT_FOUND, "file not found"),
                SstoreError::InvalidFilename(_) => (StatusCode::BAD_REQUEST, "invalid filename"),
                SstoreError::Decryption(_) | SstoreError::Integrity(_) => {
                    (StatusCode::BAD_REQUEST, "file could not be verified")
                }
                SstoreError::RateLimited { retry_after_secs } => {
                    let mut resp = (
                        StatusCode::TOO_MANY_REQUESTS,
                        Json(Envelope::err("Too Many Requests - Slow Down")),
                    )
                        .into_response();
                    resp.headers_mut()
                        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                    return resp;
                }
                SstoreError::Io(_) | SstoreError::CipherInit(_) | SstoreError::Config(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
                }
            },
        };
        (status, Json(Envelope::err(message))).into_response()
    }
}

fn outcome(e: &SstoreError) -> &'static str {
    match e {
        SstoreError::NotFound(_) => "not_found",
        SstoreError::InvalidFilename(_) => "invalid_filename",
        SstoreError::Decryption(_) => "decryption_failed",
        SstoreError::Integrity(_) => "integrity_failed",
        _ => "error",
    }
}

/// Admission gate keyed by the peer IP address. Wraps every route,
/// including unmatched paths, except [`UNLIMITED_PATHS`].
async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if UNLIMITED_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }
    let client = peer.ip().to_string();
    let decision = state.limiter.check(&client);
    if !decision.allowed {
        state.metrics.record_rate_limited();
        warn!(client = %client, path = %request.uri().path(), "rate limit exceeded");
        return ApiError::Store(SstoreError::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
        })
        .into_response();
    }
    next.run(request).await
}

async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "rejected upload form");
        ApiError::Request(StatusCode::BAD_REQUEST, "failed to parse form data")
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "error reading upload form");
                return Err(ApiError::Request(e.status(), "failed to parse form data"));
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            return Err(ApiError::Request(
                StatusCode::BAD_REQUEST,
                "no filename provided in 'file' field",
            ));
        };

        let reader = Box::pin(StreamReader::new(field.map_err(io::Error::other)));
        return match state.engine.save(&filename, reader).await {
            Ok(receipt) => {
                state.metrics.record_upload("ok");
                info!(name = %filename, bytes = receipt.bytes, "uploaded and encrypted");
                Ok(Json(Envelope {
                    checksum: Some(receipt.checksum),
                    ..Envelope::ok("file uploaded and encrypted successfully")
                }))
            }
            Err(e) => {
                state.metrics.record_upload(outcome(&e));
                if let Some(status) = multipart_status(&e) {
                    warn!(name = %filename, error = %e, "upload body rejected");
                    return Err(ApiError::Request(status, "failed to read upload body"));
                }
                warn!(name = %filename, error = %e, "upload failed");
                Err(e.into())
            }
        };
    }

    Err(ApiError::Request(
        StatusCode::BAD_REQUEST,
        "no file provided in 'file' field",
    ))
}

/// Status for failures that came from the multipart body itself (e.g. the
/// body limit), as opposed to the store.
fn multipart_status(e: &SstoreError) -> Option<StatusCode> {
    match e {
        SstoreError::Io(io) => io
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
            .map(MultipartError::status),
        _ => None,
    }
}

async fn download_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    match state.engine.load(&filename).await {
        Ok(data) => {
            state.metrics.record_download("ok");
            info!(name = %filename, bytes = data.len(), "downloaded");
            Ok((
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                data,
            )
                .into_response())
        }
        Err(e) => {
            state.metrics.record_download(outcome(&e));
            match &e {
                SstoreError::Io(_) => {
                    error!(name = %filename, error = %e, "download failed")
                }
                _ => warn!(name = %filename, error = %e, "download refused"),
            }
            Err(e.into())
        }
    }
}

async fn exists_handler(State(state): State<AppState>, Path(filename): Path<String>) -> StatusCode {
    if state.engine.exists(&filename).await {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn health_handler() -> Json<Envelope> {
    Json(Envelope::ok("healthy"))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    state.metrics.set_limiter_clients(state.limiter.len());
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("metrics encode failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn not_found() -> (StatusCode, Json<Envelope>) {
    (StatusCode::NOT_FOUND, Json(Envelope::err("not found")))
}

async fn method_not_allowed() -> (StatusCode, Json<Envelope>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(Envelope::err("method not allowed")),
    )
}
