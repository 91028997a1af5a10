//! In-memory [`JournalApi`] for tests.

use std::cell::Cell;
use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::types::{
    CommentBodies, CommentBody, CommentMeta, CommentMetaPage, EventsResponse, SessionHandle,
    SyncItem, SyncItemKind, SyncItemsPage,
};
use super::{JournalApi, RemoteError, RemoteResult};
use crate::model::{Entry, UserInfo, UsernameMap, timestamp};

/// A scripted remote journal with call counters.
pub struct FakeJournal {
    pub userinfo: UserInfo,
    /// Listing items, served in `(time, id)` order.
    pub items: Vec<SyncItem>,
    /// Entry contents; an id listed without content yields zero events.
    pub entries: BTreeMap<u64, Entry>,
    pub comments: CommentBodies,
    /// Bodies served without matching metadata.
    pub orphan_bodies: CommentBodies,
    pub usermaps: UsernameMap,
    pub page_size: usize,
    /// Makes the body endpoint fail.
    pub fail_bodies: bool,
    /// Makes the metadata endpoint report this maxid without comments.
    pub stuck_maxid: Option<u64>,
    /// Makes the listing report pending items but deliver none.
    pub stalled_listing: bool,
    /// Bodies above this id are never served.
    pub bodies_up_to: Option<u64>,
    /// Makes the body endpoint ignore the watermark and repeat its first page.
    pub repeat_bodies: bool,

    pub list_calls: Cell<usize>,
    pub entry_fetches: Cell<usize>,
    pub meta_calls: Cell<usize>,
    pub body_calls: Cell<usize>,
    pub sessions_opened: Cell<usize>,
    pub sessions_closed: Cell<usize>,
}

impl Default for FakeJournal {
    fn default() -> Self {
        Self {
            userinfo: UserInfo {
                username: "alice".into(),
                ..UserInfo::default()
            },
            items: Vec::new(),
            entries: BTreeMap::new(),
            comments: BTreeMap::new(),
            orphan_bodies: BTreeMap::new(),
            usermaps: BTreeMap::new(),
            page_size: 2,
            fail_bodies: false,
            stuck_maxid: None,
            stalled_listing: false,
            bodies_up_to: None,
            repeat_bodies: false,
            list_calls: Cell::new(0),
            entry_fetches: Cell::new(0),
            meta_calls: Cell::new(0),
            body_calls: Cell::new(0),
            sessions_opened: Cell::new(0),
            sessions_closed: Cell::new(0),
        }
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

impl FakeJournal {
    /// Publish (or republish) an entry modified at `time`.
    pub fn publish(&mut self, mut entry: Entry, time: &str) {
        let time = timestamp::parse(time).unwrap();
        self.items.retain(|i| !(i.is_journal() && i.id == entry.itemid));
        self.items.push(SyncItem {
            kind: SyncItemKind::Journal,
            id: entry.itemid,
            time,
        });
        entry.sync_time = None;
        self.entries.insert(entry.itemid, entry);
    }

    /// List an item without content.
    pub fn list_item(&mut self, kind: SyncItemKind, id: u64, time: &str) {
        self.items.push(SyncItem {
            kind,
            id,
            time: timestamp::parse(time).unwrap(),
        });
    }

    /// Add a comment by `posterid` (0 = anonymous).
    pub fn comment(
        &mut self,
        id: u64,
        entry_id: u64,
        parent: u64,
        posterid: u64,
        state: Option<&str>,
    ) {
        if posterid != 0 {
            self.usermaps.insert(posterid, format!("user{posterid}"));
        }
        self.comments.insert(
            id,
            CommentBody {
                posterid: (posterid != 0).then_some(posterid),
                state: state.map(str::to_string),
                jitemid: entry_id,
                parentid: serde_json::json!(parent.to_string()),
                subject: None,
                body: format!("comment {id}"),
                date: Some("2020-01-01T10:00:00Z".into()),
                extra: BTreeMap::new(),
            },
        );
    }

    pub fn reset_counters(&self) {
        for counter in [
            &self.list_calls,
            &self.entry_fetches,
            &self.meta_calls,
            &self.body_calls,
            &self.sessions_opened,
            &self.sessions_closed,
        ] {
            counter.set(0);
        }
    }

    fn maxid(&self) -> u64 {
        self.comments.keys().next_back().copied().unwrap_or(0)
    }
}

impl JournalApi for FakeJournal {
    fn fetch_userinfo(&self) -> RemoteResult<UserInfo> {
        Ok(self.userinfo.clone())
    }

    fn list_changes(&self, cursor: Option<NaiveDateTime>) -> RemoteResult<SyncItemsPage> {
        bump(&self.list_calls);
        if self.stalled_listing {
            return Ok(SyncItemsPage {
                items: Vec::new(),
                count: 0,
                total: 1,
            });
        }
        let mut pending: Vec<&SyncItem> = self
            .items
            .iter()
            .filter(|i| cursor.is_none_or(|c| i.time > c))
            .collect();
        pending.sort_by_key(|i| (i.time, i.id));
        let items: Vec<SyncItem> = pending
            .iter()
            .take(self.page_size)
            .map(|i| (*i).clone())
            .collect();
        Ok(SyncItemsPage {
            count: items.len() as u64,
            total: pending.len() as u64,
            items,
        })
    }

    fn fetch_entry(&self, entry_id: u64) -> RemoteResult<EventsResponse> {
        bump(&self.entry_fetches);
        Ok(EventsResponse {
            events: self.entries.get(&entry_id).cloned().into_iter().collect(),
        })
    }

    fn open_session(&self) -> RemoteResult<SessionHandle> {
        bump(&self.sessions_opened);
        Ok(SessionHandle("fake-session".into()))
    }

    fn close_session(&self, _session: &SessionHandle) -> RemoteResult<()> {
        bump(&self.sessions_closed);
        Ok(())
    }

    fn fetch_comment_meta(
        &self,
        highest: u64,
        _session: &SessionHandle,
    ) -> RemoteResult<CommentMetaPage> {
        bump(&self.meta_calls);
        if let Some(maxid) = self.stuck_maxid {
            return Ok(CommentMetaPage {
                maxid,
                ..CommentMetaPage::default()
            });
        }
        let comments = self
            .comments
            .range(highest + 1..)
            .take(self.page_size)
            .map(|(id, c)| {
                let meta = CommentMeta {
                    posterid: c.posterid,
                    state: c.state.clone(),
                };
                (*id, meta)
            })
            .collect();
        Ok(CommentMetaPage {
            maxid: self.maxid(),
            comments,
            usermaps: self.usermaps.clone(),
        })
    }

    fn fetch_comment_bodies(
        &self,
        highest: u64,
        _session: &SessionHandle,
    ) -> RemoteResult<CommentBodies> {
        bump(&self.body_calls);
        if self.fail_bodies {
            return Err(RemoteError::Status {
                url: "fake://comments/bodies".into(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        let start = if self.repeat_bodies { 0 } else { highest };
        let end = self.bodies_up_to.unwrap_or(u64::MAX);
        let mut page: CommentBodies = self
            .comments
            .range(start + 1..)
            .take_while(|(id, _)| **id <= end)
            .take(self.page_size)
            .map(|(id, c)| (*id, c.clone()))
            .collect();
        if highest == 0 {
            page.extend(self.orphan_bodies.clone());
        }
        Ok(page)
    }
}
