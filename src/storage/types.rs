//! Storage types: errors, record kinds, write outcomes, statistics.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Kinds of per-record files kept under `_json/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Entry,
    Comment,
}

impl RecordKind {
    /// Directory name under `_json/`.
    #[must_use]
    pub const fn dir_name(&self) -> &'static str {
        match self {
            Self::Entry => "entries",
            Self::Comment => "comments",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Comment => write!(f, "comment"),
        }
    }
}

/// What an atomic write actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// The file did not exist before.
    Created,
    /// The file existed with different content and was replaced.
    Updated,
    /// The file already held exactly these bytes; nothing was written.
    Unchanged,
}

impl WriteOutcome {
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Totals derived from the in-memory index.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub comments: usize,
    /// Comments posted by the journal owner.
    pub own_comments: usize,
    pub other_comments: usize,
    pub usernames: usize,
    pub max_comment_id: u64,
}

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored file could not be decoded.
    #[error("Invalid record in {}: {message}", path.display())]
    InvalidRecord { path: PathBuf, message: String },

    /// Target resolves outside the store root.
    #[error("Path {} is outside of store root {}", path.display(), root.display())]
    PathViolation { path: PathBuf, root: PathBuf },
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
