//! Comment sync.
//!
//! Comments are exported in two phases over one remote session:
//!
//! 1. Metadata: pages of `(comment id → poster, state)` plus poster names,
//!    requested above a watermark until the watermark reaches the remote's
//!    `maxid`.
//! 2. Bodies: pages of full comments, walked from the stored maximum up to
//!    `maxid`.
//!
//! Bodies are then merged with their metadata and stored in ascending id
//! order. A child may be stored before its parent; the tree builder does not
//! depend on arrival order.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::model::{Comment, UsernameMap};
use crate::remote::{
    CommentBodies, CommentBody, CommentMeta, CommentMetaPage, JournalApi, SessionHandle,
};
use crate::storage::JournalStore;
use crate::sync::types::{CommentSyncStats, SyncError, SyncResult};

/// Lazy walk over metadata pages.
pub struct MetaPages<'a, A: JournalApi + ?Sized> {
    api: &'a A,
    session: &'a SessionHandle,
    highest: u64,
    maxid: u64,
    done: bool,
}

impl<'a, A: JournalApi + ?Sized> MetaPages<'a, A> {
    #[must_use]
    pub fn new(api: &'a A, session: &'a SessionHandle, highest: u64) -> Self {
        Self {
            api,
            session,
            highest,
            maxid: highest + 1,
            done: false,
        }
    }

    #[must_use]
    pub fn highest(&self) -> u64 {
        self.highest
    }

    /// Latest `maxid` reported by the remote.
    #[must_use]
    pub fn maxid(&self) -> u64 {
        self.maxid
    }
}

impl<A: JournalApi + ?Sized> Iterator for MetaPages<'_, A> {
    type Item = SyncResult<CommentMetaPage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.highest >= self.maxid {
            return None;
        }

        let page = match self.api.fetch_comment_meta(self.highest, self.session) {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };

        let before = self.highest;
        self.maxid = page.maxid;
        self.highest = page.comments.keys().copied().fold(before, u64::max);

        if self.highest < self.maxid && self.highest == before {
            self.done = true;
            return Some(Err(SyncError::Protocol(format!(
                "comment metadata stalled at {before} below maxid {}",
                self.maxid
            ))));
        }

        debug!(
            highest = self.highest,
            maxid = self.maxid,
            "Metadata page with {} comments",
            page.comments.len()
        );
        Some(Ok(page))
    }
}

/// Lazy walk over body pages from a watermark up to `maxid`.
pub struct BodyPages<'a, A: JournalApi + ?Sized> {
    api: &'a A,
    session: &'a SessionHandle,
    position: u64,
    maxid: u64,
    done: bool,
}

impl<'a, A: JournalApi + ?Sized> BodyPages<'a, A> {
    #[must_use]
    pub fn new(api: &'a A, session: &'a SessionHandle, since: u64, maxid: u64) -> Self {
        Self {
            api,
            session,
            position: since,
            maxid,
            done: false,
        }
    }
}

impl<A: JournalApi + ?Sized> Iterator for BodyPages<'_, A> {
    type Item = SyncResult<CommentBodies>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.position >= self.maxid {
            return None;
        }

        let page = match self.api.fetch_comment_bodies(self.position, self.session) {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };
        if page.is_empty() {
            self.done = true;
            return None;
        }

        let before = self.position;
        self.position = page.keys().copied().fold(before, u64::max);

        if page.contains_key(&self.maxid) {
            self.done = true;
        } else if self.position == before {
            self.done = true;
            return Some(Err(SyncError::Protocol(format!(
                "comment bodies stalled at {before} below maxid {}",
                self.maxid
            ))));
        }

        debug!(
            position = self.position,
            maxid = self.maxid,
            "Body page with {} comments",
            page.len()
        );
        Some(Ok(page))
    }
}

/// Merged result of the metadata phase.
#[derive(Debug, Default)]
pub struct CommentMetadata {
    pub maxid: u64,
    pub comments: BTreeMap<u64, CommentMeta>,
    pub usermaps: UsernameMap,
    pub pages: usize,
}

/// Run the metadata phase above `highest`.
///
/// # Errors
///
/// Returns an error if a page request fails or the pages stop advancing.
pub fn fetch_metadata<A: JournalApi + ?Sized>(
    api: &A,
    session: &SessionHandle,
    highest: u64,
) -> SyncResult<CommentMetadata> {
    let mut pages = MetaPages::new(api, session, highest);
    let mut merged = pages
        .by_ref()
        .try_fold(CommentMetadata::default(), |mut acc, page| {
            let page = page?;
            acc.comments.extend(page.comments);
            acc.usermaps.extend(page.usermaps);
            acc.pages += 1;
            Ok::<_, SyncError>(acc)
        })?;
    merged.maxid = pages.maxid();
    Ok(merged)
}

/// Run the body phase from `since` up to `maxid`.
///
/// # Errors
///
/// Returns an error if a page request fails or the pages stop advancing.
pub fn fetch_bodies<A: JournalApi + ?Sized>(
    api: &A,
    session: &SessionHandle,
    since: u64,
    maxid: u64,
) -> SyncResult<(CommentBodies, usize)> {
    BodyPages::new(api, session, since, maxid).try_fold(
        (BTreeMap::new(), 0),
        |(mut all, pages), page| {
            all.extend(page?);
            Ok((all, pages + 1))
        },
    )
}

/// Build the stored comment from its body and metadata.
///
/// Metadata values win over the body's when present.
fn merge_comment(
    comment_id: u64,
    body: CommentBody,
    meta: &CommentMeta,
    usernames: &UsernameMap,
) -> Comment {
    let comment_parent_id = body.parent_id();
    let posterid = meta.posterid.or(body.posterid);
    let username = match posterid {
        Some(id) => usernames.get(&id).cloned().unwrap_or_else(|| {
            warn!(comment_id, posterid = id, "Unknown poster id");
            String::new()
        }),
        None => String::new(),
    };

    Comment {
        comment_id,
        entry_id: body.jitemid,
        comment_parent_id,
        username,
        posterid,
        state: meta.state.clone().or(body.state),
        subject: body.subject,
        body: body.body,
        date: body.date,
        extra: body.extra,
    }
}

fn run_phases<A: JournalApi + ?Sized>(
    api: &A,
    store: &mut JournalStore,
    session: &SessionHandle,
    stats: &mut CommentSyncStats,
) -> SyncResult<()> {
    let meta = fetch_metadata(api, session, stats.since)?;
    stats.meta_pages = meta.pages;
    stats.maxid = meta.maxid;
    stats.listed = meta.comments.len();

    store.merge_usernames(&meta.usermaps)?;
    stats.usernames = store.usernames().len();
    info!(
        "{} comments listed since comment_id {}",
        meta.comments.len(),
        stats.since
    );

    if meta.comments.is_empty() {
        return Ok(());
    }

    let (bodies, pages) = fetch_bodies(api, session, stats.since, meta.maxid)?;
    stats.body_pages = pages;

    for (comment_id, body) in bodies {
        let Some(comment_meta) = meta.comments.get(&comment_id) else {
            warn!(comment_id, "Comment body without metadata, skipping");
            stats.skipped += 1;
            continue;
        };
        let comment = merge_comment(comment_id, body, comment_meta, store.usernames());
        debug!(
            comment_id,
            entry_id = comment.entry_id,
            username = %comment.username,
            "Storing comment"
        );
        if store.put(comment)?.is_change() {
            stats.stored += 1;
        }
    }

    info!("{} comments stored", stats.stored);
    Ok(())
}

/// Fetch comments newer than the stored maximum and persist them.
///
/// The session is closed after both phases, and also when a phase fails;
/// a failure to close is only logged.
///
/// # Errors
///
/// Returns an error if a remote call or a store write fails, or the pages
/// stop advancing.
pub fn sync_comments<A: JournalApi + ?Sized>(
    api: &A,
    store: &mut JournalStore,
) -> SyncResult<CommentSyncStats> {
    let mut stats = CommentSyncStats {
        since: store.max_comment_id(),
        ..CommentSyncStats::default()
    };

    let session = api.open_session()?;
    let result = run_phases(api, store, &session, &mut stats);
    if let Err(e) = api.close_session(&session) {
        warn!("Failed to close session: {e}");
    }

    result.map(|()| stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeJournal;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> JournalStore {
        JournalStore::open(&dir.path().join("alice")).unwrap()
    }

    fn thread() -> FakeJournal {
        let mut fake = FakeJournal::default();
        fake.comment(1, 100, 0, 1, None);
        fake.comment(2, 100, 1, 2, None);
        fake.comment(3, 100, 5, 3, Some("S"));
        fake.comment(4, 101, 0, 0, None);
        fake.comment(5, 100, 0, 1, Some("D"));
        fake
    }

    #[test]
    fn test_full_sync_stores_every_comment() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let fake = thread();

        let stats = sync_comments(&fake, &mut store).unwrap();
        assert_eq!(stats.listed, 5);
        assert_eq!(stats.stored, 5);
        assert_eq!(stats.maxid, 5);
        assert_eq!(stats.meta_pages, 3);
        assert_eq!(stats.body_pages, 3);
        assert_eq!(fake.sessions_opened.get(), 1);
        assert_eq!(fake.sessions_closed.get(), 1);

        // Child 3 arrives before its parent 5.
        let child = store.get::<Comment>(3).unwrap();
        assert_eq!(child.comment_parent_id, 5);
        assert_eq!(child.username, "user3");
        assert_eq!(child.state.as_deref(), Some("S"));

        let anonymous = store.get::<Comment>(4).unwrap();
        assert!(anonymous.is_anonymous());
        assert_eq!(anonymous.entry_id, 101);

        assert_eq!(store.usernames().len(), 3);
        assert!(store.layout().usernames.exists());
    }

    #[test]
    fn test_incremental_sync_fetches_only_new_comments() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let mut fake = thread();
        sync_comments(&fake, &mut store).unwrap();

        fake.reset_counters();
        let stats = sync_comments(&fake, &mut store).unwrap();
        assert!(stats.is_empty());
        assert_eq!(fake.meta_calls.get(), 1);
        assert_eq!(fake.body_calls.get(), 0);

        fake.comment(6, 100, 2, 2, None);
        fake.reset_counters();
        let stats = sync_comments(&fake, &mut store).unwrap();
        assert_eq!(stats.since, 5);
        assert_eq!(stats.listed, 1);
        assert_eq!(stats.stored, 1);
        assert_eq!(fake.body_calls.get(), 1);
        assert_eq!(store.max_comment_id(), 6);
    }

    #[test]
    fn test_unknown_poster_and_malformed_parent() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let mut fake = FakeJournal::default();
        fake.comment(1, 100, 0, 9, None);
        fake.usermaps.clear();
        fake.comments.get_mut(&1).unwrap().parentid = json!("not a number");

        sync_comments(&fake, &mut store).unwrap();
        let comment = store.get::<Comment>(1).unwrap();
        assert_eq!(comment.username, "");
        assert_eq!(comment.posterid, Some(9));
        assert_eq!(comment.comment_parent_id, 0);
    }

    #[test]
    fn test_body_without_metadata_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let mut fake = FakeJournal::default();
        fake.comment(10, 100, 0, 1, None);
        fake.comment(11, 100, 10, 1, None);
        let mut stray = fake.comments[&10].clone();
        stray.body = "stray".into();
        fake.orphan_bodies.insert(5, stray);

        let stats = sync_comments(&fake, &mut store).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.stored, 2);
        assert!(!store.contains::<Comment>(5));
    }

    #[test]
    fn test_failed_body_page_still_closes_session() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let mut fake = thread();
        fake.fail_bodies = true;

        let result = sync_comments(&fake, &mut store);
        assert!(matches!(result, Err(SyncError::Remote(_))));
        assert_eq!(fake.sessions_closed.get(), 1);
        assert_eq!(store.max_comment_id(), 0);
    }

    #[test]
    fn test_empty_body_page_ends_phase_early() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let mut fake = thread();
        fake.bodies_up_to = Some(2);

        let stats = sync_comments(&fake, &mut store).unwrap();
        assert_eq!(stats.listed, 5);
        assert_eq!(stats.maxid, 5);
        assert_eq!(stats.body_pages, 1);
        assert_eq!(stats.stored, 2);
        assert_eq!(fake.body_calls.get(), 2);
        assert_eq!(fake.sessions_closed.get(), 1);
        assert_eq!(store.max_comment_id(), 2);
        assert!(!store.contains::<Comment>(3));
    }

    #[test]
    fn test_non_advancing_body_page_is_protocol_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let mut fake = thread();
        fake.repeat_bodies = true;

        let result = sync_comments(&fake, &mut store);
        assert!(matches!(result, Err(SyncError::Protocol(_))));
        assert_eq!(fake.body_calls.get(), 2);
        assert_eq!(fake.sessions_closed.get(), 1);
        assert_eq!(store.max_comment_id(), 0);
    }

    #[test]
    fn test_body_pages_stop_at_maxid() {
        let fake = thread();
        let session = SessionHandle("s".into());

        let (bodies, pages) = fetch_bodies(&fake, &session, 2, 4).unwrap();
        assert_eq!(pages, 1);
        assert_eq!(bodies.keys().copied().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(fake.body_calls.get(), 1);
    }

    #[test]
    fn test_stalled_metadata_is_protocol_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = open_store(&temp_dir);
        let fake = FakeJournal {
            stuck_maxid: Some(99),
            ..FakeJournal::default()
        };

        let result = sync_comments(&fake, &mut store);
        assert!(matches!(result, Err(SyncError::Protocol(_))));
        assert_eq!(fake.meta_calls.get(), 1);
        assert_eq!(fake.sessions_closed.get(), 1);
    }

    #[test]
    fn test_metadata_wins_over_body() {
        let body = CommentBody {
            posterid: Some(1),
            state: Some("A".into()),
            jitemid: 100,
            parentid: json!(3),
            ..CommentBody::default()
        };
        let meta = CommentMeta {
            posterid: Some(2),
            state: Some("B".into()),
        };
        let usernames = UsernameMap::from([(2, "bob".to_string())]);

        let comment = merge_comment(7, body, &meta, &usernames);
        assert_eq!(comment.posterid, Some(2));
        assert_eq!(comment.username, "bob");
        assert_eq!(comment.state.as_deref(), Some("B"));
        assert_eq!(comment.comment_parent_id, 3);
    }
}
