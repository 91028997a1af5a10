//! Sync errors and pass statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Statistics of one entry sync pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySyncStats {
    /// Listing pages requested.
    pub pages: usize,
    /// Journal items listed.
    pub listed: usize,
    /// Entries fetched and stored.
    pub downloaded: usize,
    /// Entries whose stored copy was already current.
    pub skipped: usize,
    /// Entries whose fetch did not return exactly one event.
    pub failed: usize,
}

impl EntrySyncStats {
    /// Entries handled one way or another.
    #[must_use]
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

/// Statistics of one comment sync pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CommentSyncStats {
    /// Highest stored comment id before the pass.
    pub since: u64,
    /// Highest comment id reported by the remote.
    pub maxid: u64,
    pub meta_pages: usize,
    pub body_pages: usize,
    /// Comments with metadata newer than `since`.
    pub listed: usize,
    /// Comments written to the store.
    pub stored: usize,
    /// Bodies dropped because no metadata came with them.
    pub skipped: usize,
    /// Poster names known after the pass.
    pub usernames: usize,
}

impl CommentSyncStats {
    /// Returns true if the pass found nothing new.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listed == 0 && self.stored == 0
    }
}

/// Statistics of a full backup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BackupStats {
    pub account: String,
    pub entries: EntrySyncStats,
    pub comments: CommentSyncStats,
    /// Whether the store index was reloaded from disk at the end.
    pub reloaded: bool,
    /// Rows per rebuilt index; empty when reindexing was skipped.
    pub indexes: BTreeMap<String, usize>,
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Storage failure while persisting or loading.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Remote call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The remote broke the paging contract.
    #[error("Protocol violation: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Whether a later retry of the whole pass could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_retryable(),
            Self::Storage(_) | Self::Protocol(_) => false,
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
