//! Journal entry model.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::timestamp;

/// A journal entry as returned by the remote and stored on disk.
///
/// The stored copy is always the most recently fetched version; `sync_time`
/// records the listing time it was fetched for, and drives the
/// skip-if-unchanged check on the next backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry id, unique within the journal.
    pub itemid: u64,

    /// Optional title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Body text (HTML).
    #[serde(default)]
    pub event: String,

    /// Author-supplied event time.
    #[serde(with = "timestamp")]
    pub eventtime: NaiveDateTime,

    /// Property bag (`taglist`, `opt_preformatted`, mood, music, ...).
    #[serde(default)]
    pub props: BTreeMap<String, Value>,

    /// Listing time this copy was fetched for.
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub sync_time: Option<NaiveDateTime>,

    /// Fields without a dedicated schema (`anum`, `ditemid`, `url`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Entry {
    /// Tags from the comma separated `taglist` property.
    ///
    /// Returns an empty list when the property is missing or blank.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let Some(taglist) = self.props.get("taglist").and_then(Value::as_str) else {
            return Vec::new();
        };
        let taglist = taglist.trim();
        if taglist.is_empty() {
            return Vec::new();
        }
        taglist
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }

    /// Whether the author marked the body as preformatted HTML.
    #[must_use]
    pub fn is_preformatted(&self) -> bool {
        match self.props.get("opt_preformatted") {
            Some(Value::Number(n)) => n.as_u64() == Some(1),
            Some(Value::String(s)) => s.trim() == "1",
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_entry(itemid: u64, eventtime: &str) -> Entry {
    Entry {
        itemid,
        subject: Some(format!("Entry {itemid}")),
        event: format!("Body of entry {itemid}"),
        eventtime: timestamp::parse(eventtime).unwrap(),
        props: BTreeMap::new(),
        sync_time: None,
        extra: BTreeMap::new(),
    }
}
