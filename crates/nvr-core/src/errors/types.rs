//! Error type definitions for the NVR daemon.
//!
//! Mirrors the teacher's layered `thiserror` hierarchy: a top-level
//! `AppError` aggregating per-layer error enums, with the specific kinds
//! spec.md §7 names (`ConfigInvalid`, `RelayUnavailable`, `StreamNotFound`,
//! `StreamConflict`, `RegistrationFailed`, `SegmentIoFailed`, `RateLimited`,
//! `Timeout`) represented as variants rather than bespoke error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed configuration; fatal at startup (spec.md §7 `ConfigInvalid`).
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    /// Repository/database layer errors.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Relay Controller / Relay API Client errors.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    /// Requested stream does not exist (spec.md §7 `StreamNotFound`, 404).
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// Stream name already exists (spec.md §7 `StreamConflict`, 409).
    #[error("stream conflict: {0}")]
    StreamConflict(String),

    /// Bulk or individual registration with the Relay failed; recoverable
    /// (spec.md §7 `RegistrationFailed`).
    #[error("registration failed for {0}")]
    RegistrationFailed(String),

    /// A segment file/row is unreadable; excluded from results, never fatal
    /// (spec.md §7 `SegmentIoFailed`).
    #[error("segment io failed for {0}: {1}")]
    SegmentIoFailed(String, String),

    /// A recovery action was suppressed by the rate limiter (spec.md §7 `RateLimited`).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Blocking operation exceeded its deadline (spec.md §7 `Timeout`).
    #[error("timeout: {0}")]
    Timeout(String),

    /// Request validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// Generic internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Repository layer specific errors.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    #[error("constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Relay Controller (C3) / Relay API Client (C4) specific errors, matching
/// the error-kind columns of spec.md §4.1/§4.2's operation tables.
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    #[error("failed to bind relay management port")]
    BindFailed,

    #[error("failed to spawn relay process: {0}")]
    SpawnFailed(String),

    #[error("relay is not running")]
    NotRunning,

    #[error("relay not ready")]
    NotReady,

    #[error("relay stream not found: {0}")]
    NotFound(String),

    #[error("relay returned conflict, resolved as replace")]
    ConflictResolvedAsReplace,

    #[error("relay http error: {0}")]
    HttpError(u16),

    #[error("relay request timed out")]
    Timeout,
}

impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::NotFound(name) => AppError::StreamNotFound(name),
            RelayError::Timeout => AppError::Relay(err),
            other => AppError::Relay(other),
        }
    }
}

impl AppError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConfigInvalid(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Relay(RelayError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Relay(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::StreamNotFound(_) => StatusCode::NOT_FOUND,
            AppError::StreamConflict(_) => StatusCode::CONFLICT,
            AppError::RegistrationFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SegmentIoFailed(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_kind(&self) -> &'static str {
        match self {
            AppError::ConfigInvalid(_) => "config_invalid",
            AppError::Repository(_) => "repository_error",
            AppError::Relay(RelayError::NotFound(_)) => "stream_not_found",
            AppError::Relay(_) => "relay_unavailable",
            AppError::StreamNotFound(_) => "stream_not_found",
            AppError::StreamConflict(_) => "stream_conflict",
            AppError::RegistrationFailed(_) => "registration_failed",
            AppError::SegmentIoFailed(_, _) => "segment_io_failed",
            AppError::RateLimited(_) => "rate_limited",
            AppError::Timeout(_) => "timeout",
            AppError::Validation(_) => "validation_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

/// Policy: surface unrecoverable conditions as explicit JSON error bodies at
/// the HTTP boundary with the status codes spec.md §7 specifies.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.error_kind(), "request failed");
        } else {
            tracing::warn!(error = %self, kind = self.error_kind(), "request rejected");
        }
        let body = json!({
            "error": self.error_kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
pub type RepositoryResult<T> = Result<T, RepositoryError>;
pub type RelayResult<T> = Result<T, RelayError>;
