//! Comment model and moderation states.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored comment.
///
/// `comment_parent_id` is 0 for top-level comments, otherwise the id of
/// another comment of the same entry. The parent may not be present locally
/// yet while a backup is still in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment id, unique within the journal.
    pub comment_id: u64,

    /// Owning entry.
    pub entry_id: u64,

    /// Parent comment id, 0 for root comments.
    #[serde(default)]
    pub comment_parent_id: u64,

    /// Resolved poster name, empty for anonymous comments.
    #[serde(default)]
    pub username: String,

    /// Numeric poster id, absent for anonymous comments.
    #[serde(
        default,
        deserialize_with = "super::lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub posterid: Option<u64>,

    /// Raw moderation code (`A`, `F`, `S`, `D`, `B` or absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default)]
    pub body: String,

    /// Posting date as reported by the remote (ISO-8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Comment {
    /// Hidden by moderation (deleted or banned).
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        matches!(self.state.as_deref(), Some("D" | "B"))
    }

    /// Whether the poster had no account.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }
}

/// Moderation state of a rendered comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentState {
    Visible,
    Screened,
    Deleted,
    Banned,
}

impl CommentState {
    /// Map a raw moderation code.
    ///
    /// Absent and empty codes are visible. Returns `None` for codes outside
    /// the known vocabulary.
    #[must_use]
    pub fn from_code(code: Option<&str>) -> Option<Self> {
        match code.map(str::trim) {
            None | Some("" | "A" | "F") => Some(Self::Visible),
            Some("S") => Some(Self::Screened),
            Some("D") => Some(Self::Deleted),
            Some("B") => Some(Self::Banned),
            Some(_) => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Screened => "screened",
            Self::Deleted => "deleted",
            Self::Banned => "banned",
        }
    }
}

impl fmt::Display for CommentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
pub(crate) fn sample_comment(
    comment_id: u64,
    entry_id: u64,
    parent_id: u64,
    state: Option<&str>,
) -> Comment {
    Comment {
        comment_id,
        entry_id,
        comment_parent_id: parent_id,
        username: format!("user{comment_id}"),
        posterid: Some(comment_id * 10),
        state: state.map(String::from),
        subject: None,
        body: format!("comment {comment_id}"),
        date: Some("2020-01-01T10:00:00Z".to_string()),
        extra: BTreeMap::new(),
    }
}
