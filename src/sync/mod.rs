//! Incremental backup of one account.
//!
//! - **Entries**: listing pages → stale entries → fetched and stored
//! - **Comments**: metadata pages → body pages → merged and stored
//! - **Backup**: user info, entries, comments, reload, reindex
//!
//! # Watermarks
//!
//! Entry sync is driven by the `last_sync` time cursor of the listing;
//! comment sync by the highest stored comment id. Both advance
//! monotonically, and a remote that stops advancing them is reported as a
//! protocol violation instead of being polled forever.
//!
//! Nothing is ever deleted: a record fetched once stays in the store and is
//! only overwritten by a newer copy of the same id.
//!
//! # Example
//!
//! ```ignore
//! use jb::remote::HttpJournalApi;
//! use jb::storage::JournalStore;
//! use jb::sync::Backup;
//!
//! let api = HttpJournalApi::new(endpoint, "alice", None, timeout)?;
//! let mut store = JournalStore::open(&root.join("alice"))?;
//! let stats = Backup::new(&api, &mut store).run()?;
//! ```

mod comments;
mod entries;
mod types;

pub use comments::{
    BodyPages, CommentMetadata, MetaPages, fetch_bodies, fetch_metadata, sync_comments,
};
pub use entries::{ListingPages, list_entries, sync_entries};
pub use types::{BackupStats, CommentSyncStats, EntrySyncStats, SyncError, SyncResult};

use std::collections::BTreeMap;

use tracing::info;

use crate::index;
use crate::remote::JournalApi;
use crate::storage::JournalStore;

/// One backup pass over a store.
pub struct Backup<'a, A: JournalApi + ?Sized> {
    api: &'a A,
    store: &'a mut JournalStore,
    reindex: bool,
}

impl<'a, A: JournalApi + ?Sized> Backup<'a, A> {
    pub fn new(api: &'a A, store: &'a mut JournalStore) -> Self {
        Self {
            api,
            store,
            reindex: true,
        }
    }

    /// Skip (or not) rebuilding the indexes at the end of the pass.
    #[must_use]
    pub fn with_reindex(mut self, reindex: bool) -> Self {
        self.reindex = reindex;
        self
    }

    /// Run the pass.
    ///
    /// # Errors
    ///
    /// Returns an error on the first remote, protocol or storage failure.
    /// Everything stored before the failure stays stored.
    pub fn run(self) -> SyncResult<BackupStats> {
        let userinfo = self.api.fetch_userinfo()?;
        self.store.merge_userinfo(userinfo)?;
        let account = self.store.userinfo().username.clone();
        info!(%account, "Backing up into {}", self.store.root().display());

        let entries = sync_entries(self.api, self.store)?;
        let comments = sync_comments(self.api, self.store)?;
        let reloaded = self.store.reload(false)?;

        let indexes = if self.reindex {
            index::reindex(self.store)?
        } else {
            BTreeMap::new()
        };

        Ok(BackupStats {
            account,
            entries,
            comments,
            reloaded,
            indexes,
        })
    }
}
