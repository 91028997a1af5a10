//! Wire types of the remote journal API.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Entry, UsernameMap, timestamp};

/// What a listing item refers to, from the `X-` prefix of its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncItemKind {
    /// `L-<id>`: a journal entry.
    Journal,
    /// `C-<id>`: a comment.
    Comment,
    /// Any other prefix.
    Other(String),
}

impl SyncItemKind {
    fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "L" => Self::Journal,
            "C" => Self::Comment,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One changed item reported by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSyncItem")]
pub struct SyncItem {
    pub kind: SyncItemKind,
    pub id: u64,
    /// Last modification time on the remote.
    pub time: NaiveDateTime,
}

impl SyncItem {
    #[must_use]
    pub fn is_journal(&self) -> bool {
        self.kind == SyncItemKind::Journal
    }
}

#[derive(Deserialize)]
struct RawSyncItem {
    item: String,
    time: String,
}

impl TryFrom<RawSyncItem> for SyncItem {
    type Error = String;

    fn try_from(raw: RawSyncItem) -> Result<Self, Self::Error> {
        let (prefix, id) = raw
            .item
            .split_once('-')
            .ok_or_else(|| format!("malformed sync item tag: {:?}", raw.item))?;
        let id = id
            .parse()
            .map_err(|_| format!("malformed sync item id: {:?}", raw.item))?;
        let time = timestamp::parse(&raw.time)
            .map_err(|e| format!("malformed sync item time {:?}: {e}", raw.time))?;
        Ok(Self {
            kind: SyncItemKind::from_prefix(prefix),
            id,
            time,
        })
    }
}

/// One page of the change listing.
///
/// `count` is the number of items in this page, `total` the number of
/// items changed since the requested cursor. The page is the last one when
/// they are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncItemsPage {
    #[serde(rename = "syncitems", default)]
    pub items: Vec<SyncItem>,
    pub count: u64,
    pub total: u64,
}

impl SyncItemsPage {
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.count == self.total
    }
}

/// Response of a single-entry fetch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<Entry>,
}

/// Opaque handle for the comment export endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(pub String);

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the full token.
        let shown: String = self.0.chars().take(6).collect();
        write!(f, "{shown}…")
    }
}

/// Moderation metadata of one comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommentMeta {
    #[serde(default, deserialize_with = "crate::model::lenient_id")]
    pub posterid: Option<u64>,
    #[serde(default)]
    pub state: Option<String>,
}

/// One page of comment metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommentMetaPage {
    /// Highest comment id that currently exists on the remote.
    pub maxid: u64,
    #[serde(default)]
    pub comments: BTreeMap<u64, CommentMeta>,
    #[serde(default)]
    pub usermaps: UsernameMap,
}

/// Full content of one comment from the body endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommentBody {
    #[serde(default, deserialize_with = "crate::model::lenient_id")]
    pub posterid: Option<u64>,
    #[serde(default)]
    pub state: Option<String>,
    /// Owning entry.
    pub jitemid: u64,
    /// Parent comment id; may be a number, a numeric string or junk.
    #[serde(default)]
    pub parentid: Value,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CommentBody {
    /// Parent id, 0 when absent or malformed.
    #[must_use]
    pub fn parent_id(&self) -> u64 {
        crate::model::parse_id(&self.parentid).unwrap_or(0)
    }
}

/// Comment bodies keyed by comment id.
pub type CommentBodies = BTreeMap<u64, CommentBody>;
