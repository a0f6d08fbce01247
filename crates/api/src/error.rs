use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use doshboard_core::error::CoreError;
use doshboard_core::fetch::FetchError;
use doshboard_db::StoreError;
use doshboard_refresh::CacheError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`StoreError`] for
/// configuration store failures. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `doshboard_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A configuration store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A read-through provider lookup failed.
    #[error(transparent)]
    Provider(#[from] FetchError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(id) => AppError::Core(CoreError::NotFound {
                entity: "Widget value",
                id,
            }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::InvalidConfig(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_CONFIG", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Store errors ---
            AppError::Store(err) => classify_store_error(err),

            // --- Provider lookups ---
            AppError::Provider(err) => classify_fetch_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a provider lookup failure. A rejected lookup is reported as
/// not found; anything else means the provider is unavailable right now.
fn classify_fetch_error(err: &FetchError) -> (StatusCode, &'static str, String) {
    match err {
        FetchError::InvalidConfig(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        other => {
            tracing::warn!(error_kind = other.kind(), error = %other, "Provider lookup failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "PROVIDER_UNAVAILABLE",
                other.to_string(),
            )
        }
    }
}

/// Classify a store error into an HTTP status, error code, and message.
///
/// Database and corruption details are logged, never returned.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Widget with id {id} not found"),
        ),
        StoreError::Invalid(msg) => (StatusCode::BAD_REQUEST, "INVALID_CONFIG", msg.clone()),
        StoreError::Corrupt { id, reason } => {
            tracing::error!(widget_id = id, reason = %reason, "Corrupt widget configuration");
            internal()
        }
        StoreError::Database(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        StoreError::Database(db_err) => {
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
    }
}
