//! Entry indexes (tags, months).
//!
//! Indexes group entry ids under a key and are saved as
//! `_json/indexes/<descriptor>.js`:
//!
//! ```json
//! {"meta": {"descriptor": "tags", "title": "Tags"},
//!  "rows": [{"key": "rust", "title": "rust", "entries": [3, 17]}]}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Entry;
use crate::storage::{JournalStore, StorageResult};

/// A persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub meta: IndexMeta,
    pub rows: Vec<IndexRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub descriptor: String,
    pub title: String,
}

/// One key and the entries filed under it, in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    pub key: String,
    pub title: String,
    pub entries: Vec<u64>,
}

/// Supported indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Entries by tag, least used tags first.
    Tags,
    /// Entries by `YYYY-MM` of their event time.
    Months,
}

impl IndexKind {
    pub const ALL: [Self; 2] = [Self::Months, Self::Tags];

    #[must_use]
    pub const fn descriptor(&self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Months => "months",
        }
    }

    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Tags => "Tags",
            Self::Months => "Months",
        }
    }

    /// `(key, title)` rows an entry belongs to.
    fn rows_for(self, entry: &Entry) -> Vec<(String, String)> {
        match self {
            Self::Tags => entry.tags().into_iter().map(|t| (t.clone(), t)).collect(),
            Self::Months => vec![(
                entry.eventtime.format("%Y-%m").to_string(),
                entry.eventtime.format("%B %Y").to_string(),
            )],
        }
    }

    fn sort_rows(self, rows: &mut [IndexRow]) {
        match self {
            Self::Tags => rows.sort_by(|a, b| {
                a.entries
                    .len()
                    .cmp(&b.entries.len())
                    .then_with(|| a.key.cmp(&b.key))
            }),
            Self::Months => rows.sort_by(|a, b| a.key.cmp(&b.key)),
        }
    }

    /// Build the index over `entries`.
    pub fn build<'a>(self, entries: impl IntoIterator<Item = &'a Entry>) -> IndexDocument {
        let mut by_key: BTreeMap<String, IndexRow> = BTreeMap::new();
        for entry in entries {
            for (key, title) in self.rows_for(entry) {
                by_key
                    .entry(key.clone())
                    .or_insert_with(|| IndexRow {
                        key,
                        title,
                        entries: Vec::new(),
                    })
                    .entries
                    .push(entry.itemid);
            }
        }

        let mut rows: Vec<IndexRow> = by_key.into_values().collect();
        for row in &mut rows {
            row.entries.sort_unstable();
            row.entries.dedup();
        }
        self.sort_rows(&mut rows);

        IndexDocument {
            meta: IndexMeta {
                descriptor: self.descriptor().to_string(),
                title: self.title().to_string(),
            },
            rows,
        }
    }
}

/// Rebuild every index from the stored entries and save it.
///
/// Returns the number of rows per descriptor.
///
/// # Errors
///
/// Returns an error if an index file cannot be written.
pub fn reindex(store: &mut JournalStore) -> StorageResult<BTreeMap<String, usize>> {
    info!("Reindexing entries...");
    let mut summary = BTreeMap::new();
    for kind in IndexKind::ALL {
        let doc = kind.build(store.all::<Entry>());
        summary.insert(doc.meta.descriptor.clone(), doc.rows.len());
        store.save_index(doc)?;
    }
    Ok(summary)
}
