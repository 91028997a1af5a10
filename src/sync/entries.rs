//! Entry sync: discover changed entries through the listing endpoint and
//! fetch the ones whose stored copy is stale.
//!
//! The listing is paged by a `last_sync` cursor. Each page reports how many
//! items it carries (`count`) and how many are pending since the cursor
//! (`total`); the listing is complete when they are equal. After a page the
//! cursor moves to the time of the last journal item in it, or to the last
//! item of any kind when it held no journal items.

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::model::{Entry, timestamp};
use crate::remote::{JournalApi, SyncItemsPage};
use crate::storage::JournalStore;
use crate::sync::types::{EntrySyncStats, SyncError, SyncResult};

/// Lazy, non-restartable walk over the listing pages.
pub struct ListingPages<'a, A: JournalApi + ?Sized> {
    api: &'a A,
    cursor: Option<NaiveDateTime>,
    done: bool,
}

impl<'a, A: JournalApi + ?Sized> ListingPages<'a, A> {
    #[must_use]
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            cursor: None,
            done: false,
        }
    }

    /// Cursor the next page will be requested with.
    #[must_use]
    pub fn cursor(&self) -> Option<NaiveDateTime> {
        self.cursor
    }

    fn advance(&mut self, page: &SyncItemsPage) -> SyncResult<()> {
        let next = page
            .items
            .iter()
            .rev()
            .find(|item| item.is_journal())
            .or_else(|| page.items.last())
            .map(|item| item.time);

        match next {
            Some(time) if self.cursor.is_none_or(|c| time > c) => {
                self.cursor = Some(time);
                Ok(())
            }
            _ => Err(SyncError::Protocol(format!(
                "listing stalled at {} with {} of {} items delivered",
                self.cursor
                    .map_or_else(|| "start".to_string(), |c| timestamp::format(&c)),
                page.count,
                page.total
            ))),
        }
    }
}

impl<A: JournalApi + ?Sized> Iterator for ListingPages<'_, A> {
    type Item = SyncResult<SyncItemsPage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let page = match self.api.list_changes(self.cursor) {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };

        if page.is_last() {
            self.done = true;
        } else if let Err(e) = self.advance(&page) {
            self.done = true;
            return Some(Err(e));
        }

        debug!(
            count = page.count,
            total = page.total,
            "Listing page with {} items",
            page.items.len()
        );
        Some(Ok(page))
    }
}

/// Changed journal entries as `(entry_id, remote_time)` in listing order,
/// plus the number of pages it took.
///
/// # Errors
///
/// Returns an error if a page request fails or the listing stalls.
pub fn list_entries<A: JournalApi + ?Sized>(
    api: &A,
) -> SyncResult<(Vec<(u64, NaiveDateTime)>, usize)> {
    ListingPages::new(api).try_fold((Vec::new(), 0), |(mut items, pages), page| {
        let page = page?;
        items.extend(
            page.items
                .iter()
                .filter(|item| item.is_journal())
                .map(|item| (item.id, item.time)),
        );
        Ok((items, pages + 1))
    })
}

/// Bring the stored entries up to date with the remote.
///
/// An entry is fetched only when it is missing locally or its stored
/// `sync_time` differs from the listed time. A fetch that does not return
/// exactly one event is logged and counted as failed.
///
/// # Errors
///
/// Returns an error if a remote call or a store write fails, or the listing
/// stalls.
pub fn sync_entries<A: JournalApi + ?Sized>(
    api: &A,
    store: &mut JournalStore,
) -> SyncResult<EntrySyncStats> {
    let (listed, pages) = list_entries(api)?;
    info!("{} entries listed", listed.len());

    let mut stats = EntrySyncStats {
        pages,
        listed: listed.len(),
        ..EntrySyncStats::default()
    };

    for (entry_id, remote_time) in listed {
        let current = store
            .get::<Entry>(entry_id)
            .is_some_and(|stored| stored.sync_time == Some(remote_time));
        if current {
            stats.skipped += 1;
            continue;
        }

        debug!(entry_id, sync_time = %timestamp::format(&remote_time), "Syncing entry");
        let mut events = api.fetch_entry(entry_id)?.events;
        if events.len() != 1 {
            warn!(entry_id, "Expected exactly one event, got {}", events.len());
            stats.failed += 1;
            continue;
        }

        let Some(mut entry) = events.pop() else {
            continue;
        };
        if entry.itemid != entry_id {
            warn!(entry_id, got = entry.itemid, "Fetched entry id does not match listing");
            stats.failed += 1;
            continue;
        }
        entry.sync_time = Some(remote_time);
        store.put(entry)?;
        stats.downloaded += 1;
    }

    info!("{} entries downloaded", stats.downloaded);
    Ok(stats)
}
