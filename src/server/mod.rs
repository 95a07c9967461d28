//! HTTP API for backup export and import.
//!
//! # Endpoints
//!
//! - `GET /health` - liveness probe, no auth
//! - `GET /backup/export` - `{filename, backup}`
//! - `POST /backup/import` - body `{backup}`, returns `{restored: {tables, counts}}`
//!
//! Backup endpoints require `Authorization: Bearer <API_SHARED_TOKEN>`.
//! Successful responses are wrapped as `{data, meta: {timestamp}}`,
//! failures as `{error, meta: {timestamp}}`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::backup::{
    extract_backup_payload, BackupEngine, BackupError, ExportEnvelope, ImportEnvelope,
};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;

/// Largest accepted import body.
const MAX_IMPORT_BYTES: usize = 64 * 1024 * 1024;

// ==================
// Shared State
// ==================

/// State shared across handlers.
///
/// One connection serves every request; imports serialize on the mutex and
/// each request builds its own engine. Store work runs on the blocking pool.
pub struct AppState {
    storage: Mutex<SqliteStorage>,
    token: String,
    /// Set when a failed import left the connection inside a transaction.
    unusable: AtomicBool,
}

impl AppState {
    #[must_use]
    pub fn new(storage: SqliteStorage, token: String) -> Self {
        Self {
            storage: Mutex::new(storage),
            token,
            unusable: AtomicBool::new(false),
        }
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, SqliteStorage>> {
        if self.unusable.load(Ordering::Acquire) {
            return Err(Error::Other(
                "storage is unusable after a failed rollback; restart the server".to_string(),
            ));
        }
        self.storage
            .lock()
            .map_err(|_| Error::Other("storage lock poisoned".to_string()))
    }

    /// Check the request's bearer token against the shared token.
    fn authorize(&self, headers: &HeaderMap) -> Result<()> {
        let incoming = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        match incoming {
            Some(token) if bool::from(token.as_bytes().ct_eq(self.token.as_bytes())) => Ok(()),
            _ => Err(Error::Unauthorized),
        }
    }
}

/// Run `op` against the locked store on the blocking pool.
async fn with_storage<T, F>(state: Arc<AppState>, op: F) -> Result<T>
where
    F: FnOnce(&AppState, &mut SqliteStorage) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut storage = state.lock_storage()?;
        op(&*state, &mut *storage)
    })
    .await
    .map_err(|e| Error::Other(format!("storage task failed: {e}")))?
}

// ==================
// Response Types
// ==================

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Successful response, wrapped in the `{data, meta}` envelope.
pub struct ApiResponse<T>(pub T);

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(json!({
            "data": self.0,
            "meta": { "timestamp": timestamp() },
        }))
        .into_response()
    }
}

/// Failed response, wrapped in the `{error, meta}` envelope.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<BackupError> for ApiError {
    fn from(err: BackupError) -> Self {
        Self(Error::Backup(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }

        (
            status,
            Json(json!({
                "error": self.0.to_string(),
                "meta": { "timestamp": timestamp() },
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<ApiResponse<T>, ApiError>;

// ==================
// Routes
// ==================

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/backup/export", get(export_handler))
        .route("/backup/import", post(import_handler))
        .layer(DefaultBodyLimit::max(MAX_IMPORT_BYTES))
        .with_state(state)
}

/// Serve the API until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address can't be bound or the server fails.
pub async fn serve(config: ServerConfig, storage: SqliteStorage) -> Result<()> {
    let state = Arc::new(AppState::new(storage, config.token));
    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, "kai API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("kai API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}

// ==================
// Handlers
// ==================

async fn health_handler() -> ApiResponse<Value> {
    ApiResponse(json!({ "status": "ok" }))
}

async fn export_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<ExportEnvelope> {
    state.authorize(&headers)?;

    let envelope = with_storage(state, |_, storage| {
        Ok(BackupEngine::new(storage).export_envelope()?)
    })
    .await?;
    Ok(ApiResponse(envelope))
}

async fn import_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ImportEnvelope> {
    state.authorize(&headers)?;

    // An unparseable body is treated like one without a backup
    let mut payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    extract_backup_payload(&payload)?;
    let document = payload
        .get_mut("backup")
        .map(Value::take)
        .unwrap_or_default();

    let restored = with_storage(state, move |state, storage| {
        let result = BackupEngine::new(&mut *storage).import(&document);
        if result.is_err() {
            settle_after_failure(state, storage);
        }
        Ok(result?)
    })
    .await?;
    Ok(ApiResponse(ImportEnvelope { restored }))
}

/// Make sure a failed import didn't leave the shared connection mid
/// transaction. If it did and can't be recovered, refuse further store work.
fn settle_after_failure(state: &AppState, storage: &mut SqliteStorage) {
    if let Err(e) = storage.settle() {
        error!(error = %e, "connection left inconsistent after failed import");
        state.unusable.store(true, Ordering::Release);
    }
}
