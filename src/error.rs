//! Error types for Kai.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 4=validation, 6=backup, etc.)
//! - HTTP status mapping for the API
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::backup::BackupError;

/// Result type alias for Kai operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Validation (exit 4)
    InvalidBackup,

    // Backup (exit 6)
    ImportFailed,
    StoreError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Auth (exit 10)
    Unauthorized,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InvalidBackup => "INVALID_BACKUP",
            Self::ImportFailed => "IMPORT_FAILED",
            Self::StoreError => "STORE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::InvalidBackup => 4,
            Self::ImportFailed | Self::StoreError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::Unauthorized => 10,
        }
    }

    /// Whether the caller should retry with corrected input.
    ///
    /// Imports are all-or-nothing and never retried internally; a
    /// corrected payload is the only way forward.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidBackup | Self::Unauthorized)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Kai operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `kai init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid or missing token")]
    Unauthorized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Backup(e) => match e {
                BackupError::Validation(_) => ErrorCode::InvalidBackup,
                BackupError::Import(_) => ErrorCode::ImportFailed,
                BackupError::Store(_) => ErrorCode::StoreError,
                BackupError::Io(_) => ErrorCode::IoError,
                BackupError::Json(_) => ErrorCode::JsonError,
            },
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// HTTP status the API responds with for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Backup(e) => e.http_status(),
            Self::Json(_) => 400,
            Self::Unauthorized => 401,
            _ => 500,
        }
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `kai init` to create the database".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::Backup(BackupError::Validation(_)) => Some(
                "Expected a document with a `tables` object, or an export envelope \
                 with a `backup` object. Create one with `kai backup export`."
                    .to_string(),
            ),

            Self::Backup(BackupError::Import(_)) => Some(
                "Nothing was changed: the import was rolled back. \
                 Fix the backup file and import it again."
                    .to_string(),
            ),

            Self::Unauthorized => Some(
                "Send `Authorization: Bearer <token>` using the API_SHARED_TOKEN value"
                    .to_string(),
            ),

            Self::Database(_)
            | Self::Backup(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_errors_keep_their_message() {
        let err = Error::from(BackupError::Import("disk full".to_string()));
        assert_eq!(err.to_string(), "Import failed: disk full");
        assert_eq!(err.error_code(), ErrorCode::ImportFailed);
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_validation_maps_to_422() {
        let err = Error::from(BackupError::Validation(
            "Backup payload missing tables".to_string(),
        ));
        assert_eq!(err.http_status(), 422);
        assert!(err.error_code().is_retryable());
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::NotInitialized.exit_code(), 2);
        assert_eq!(
            Error::from(BackupError::Validation("x".to_string())).exit_code(),
            4
        );
        assert_eq!(Error::Config("x".to_string()).exit_code(), 7);
        assert_eq!(Error::Unauthorized.http_status(), 401);
        assert_eq!(Error::Other("x".to_string()).http_status(), 500);
    }

    #[test]
    fn test_structured_json() {
        let json = Error::Unauthorized.to_structured_json();
        assert_eq!(json["error"]["code"], "UNAUTHORIZED");
        assert_eq!(json["error"]["message"], "Invalid or missing token");
        assert_eq!(json["error"]["exit_code"], 10);
        assert!(json["error"]["hint"].is_string());
    }
}
