//! Structured error types shared by the storage layer, the CLI and the REST API.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (4xx-like)
    ValidationError,

    // Not found errors
    NotFound,

    // Conflict errors
    DuplicateKey,

    // Storage / internal errors
    StorageUnavailable,
    InternalError,
}

/// Structured domain error.
///
/// Storage functions return `anyhow::Result` and raise this type for failures
/// a caller can act on; edges recover it with [`AppError::from_anyhow`].
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn required(field: &str, what: &str) -> Self {
        Self::new(ErrorCode::ValidationError, format!("{} is required", what)).with_field(field)
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, reason).with_field(field)
    }

    pub fn project_not_found(project_id: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Project not found: {}", project_id),
        )
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("Task not found: {}", task_id))
    }

    pub fn snapshot_not_found(snapshot_id: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Snapshot not found: {}", snapshot_id),
        )
    }

    pub fn duplicate(kind: &str, id: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateKey,
            format!("{} already exists: {}", kind, id),
        )
        .with_field("id")
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::StorageUnavailable, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }

    /// Recover a structured error from an `anyhow` chain.
    ///
    /// Errors that were never an `AppError` become `StorageUnavailable` when a
    /// SQLite failure is found in the chain, `InternalError` otherwise.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app_err) => app_err,
            Err(err) => {
                if err.chain().any(|cause| cause.is::<rusqlite::Error>()) {
                    AppError::storage(format!("{:#}", err))
                } else {
                    AppError::internal(format!("{:#}", err))
                }
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_anyhow(err)
    }
}

/// Returns the `ErrorCode` carried by an anyhow error, if any.
pub fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.downcast_ref::<AppError>().map(|e| e.code)
}

/// True when a rusqlite error is a PRIMARY KEY / UNIQUE violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
