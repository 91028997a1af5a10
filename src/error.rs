//! Error types for the journal backup CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 4=validation, etc.)
//! - Retryability flags for scripted re-runs
//! - Context-aware recovery hints
//! - Structured JSON output for `--json` consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;
use crate::sync::SyncError;
use crate::tree::TreeError;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    StorageError,
    CorruptRecord,
    PathViolation,

    // Not Found (exit 3)
    BackupNotFound,
    EntryNotFound,

    // Validation (exit 4)
    InvalidArgument,
    MissingAccount,
    MissingEndpoint,

    // Comment tree (exit 5)
    OrphanComment,
    CommentCycle,
    UnknownState,

    // Remote / sync (exit 6)
    RemoteUnavailable,
    RemoteError,
    ProtocolError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::StorageError => "STORAGE_ERROR",
            Self::CorruptRecord => "CORRUPT_RECORD",
            Self::PathViolation => "PATH_VIOLATION",
            Self::BackupNotFound => "BACKUP_NOT_FOUND",
            Self::EntryNotFound => "ENTRY_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::MissingAccount => "MISSING_ACCOUNT",
            Self::MissingEndpoint => "MISSING_ENDPOINT",
            Self::OrphanComment => "ORPHAN_COMMENT",
            Self::CommentCycle => "COMMENT_CYCLE",
            Self::UnknownState => "UNKNOWN_STATE",
            Self::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            Self::RemoteError => "REMOTE_ERROR",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::StorageError | Self::CorruptRecord | Self::PathViolation => 2,
            Self::BackupNotFound | Self::EntryNotFound => 3,
            Self::InvalidArgument | Self::MissingAccount | Self::MissingEndpoint => 4,
            Self::OrphanComment | Self::CommentCycle | Self::UnknownState => 5,
            Self::RemoteUnavailable | Self::RemoteError | Self::ProtocolError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-running the same command later could succeed.
    ///
    /// True only for transient remote failures. A backup pass keeps
    /// everything it stored before failing, so a retry resumes from the
    /// watermarks.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in CLI operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No backup found at {path}")]
    BackupNotFound { path: PathBuf },

    #[error("Entry not found: {id}")]
    EntryNotFound { id: u64 },

    #[error("No account configured")]
    MissingAccount,

    #[error("No remote endpoint configured")]
    MissingEndpoint,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        Self::Sync(SyncError::Remote(err))
    }
}

const fn storage_code(err: &StorageError) -> ErrorCode {
    match err {
        StorageError::Io(_) => ErrorCode::IoError,
        StorageError::Json(_) => ErrorCode::JsonError,
        StorageError::InvalidRecord { .. } => ErrorCode::CorruptRecord,
        StorageError::PathViolation { .. } => ErrorCode::PathViolation,
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::BackupNotFound { .. } => ErrorCode::BackupNotFound,
            Self::EntryNotFound { .. } => ErrorCode::EntryNotFound,
            Self::MissingAccount => ErrorCode::MissingAccount,
            Self::MissingEndpoint => ErrorCode::MissingEndpoint,
            Self::Storage(e) | Self::Sync(SyncError::Storage(e)) => storage_code(e),
            Self::Sync(SyncError::Remote(e)) => {
                if e.is_retryable() {
                    ErrorCode::RemoteUnavailable
                } else {
                    ErrorCode::RemoteError
                }
            }
            Self::Sync(SyncError::Protocol(_)) => ErrorCode::ProtocolError,
            Self::Tree(TreeError::OrphanComment { .. }) => ErrorCode::OrphanComment,
            Self::Tree(TreeError::Cycle { .. }) => ErrorCode::CommentCycle,
            Self::Tree(TreeError::UnknownState { .. }) => ErrorCode::UnknownState,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::BackupNotFound { path } => Some(format!(
                "Nothing has been backed up to {} yet. Run `jb backup` first.",
                path.display()
            )),
            Self::EntryNotFound { id } => Some(format!(
                "Entry {id} is not in the local backup. Run `jb backup` to fetch new entries."
            )),
            Self::MissingAccount => Some(
                "Pass --account <name>, set JB_ACCOUNT, or add \"account\" to the config file"
                    .to_string(),
            ),
            Self::MissingEndpoint => Some(
                "Pass --endpoint <url>, set JB_ENDPOINT, or add \"endpoint\" to the config file"
                    .to_string(),
            ),
            Self::Storage(StorageError::InvalidRecord { path, .. })
            | Self::Sync(SyncError::Storage(StorageError::InvalidRecord { path, .. })) => {
                Some(format!(
                    "Fix or remove {} and run `jb backup` again to refetch it.",
                    path.display()
                ))
            }
            Self::Sync(SyncError::Remote(e)) if e.is_retryable() => Some(
                "The remote is unavailable. Re-run `jb backup` later; it resumes where it stopped."
                    .to_string(),
            ),
            Self::Sync(SyncError::Protocol(_)) => Some(
                "The remote stopped advancing its paging cursor. Everything fetched so far is stored."
                    .to_string(),
            ),
            Self::Tree(TreeError::OrphanComment { parent_id, .. }) => Some(format!(
                "Comment {parent_id} is missing locally. Run `jb backup` to fetch it."
            )),
            _ => None,
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
