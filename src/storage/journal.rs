//! File-backed journal store.
//!
//! One JSON file per record under a kind-specific directory:
//!
//! ```text
//! <root>/_json/entries/<itemid>.js
//! <root>/_json/comments/<comment_id>.js
//! <root>/_json/userinfo.js
//! <root>/_json/usernames.js
//! <root>/_json/indexes/<descriptor>.js
//! ```
//!
//! The store handle owns an in-memory index of everything on disk and a
//! `modified` marker. Every write goes through [`atomic_write`], so a reader
//! only ever sees a complete previous or complete new version of a file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::index::IndexDocument;
use crate::model::{Comment, Entry, UserInfo, UsernameMap};
use crate::storage::file::{
    RECORD_EXTENSION, atomic_write, encode_record, list_record_files, normalize_path, read_record,
};
use crate::storage::types::{
    RecordKind, StorageError, StorageResult, StoreStats, WriteOutcome,
};

/// Paths of one account's backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub root: PathBuf,
    pub json: PathBuf,
    pub entries: PathBuf,
    pub comments: PathBuf,
    pub indexes: PathBuf,
    pub media: PathBuf,
    pub userinfo: PathBuf,
    pub usernames: PathBuf,
}

impl StoreLayout {
    /// Layout rooted at `root`, which is made absolute and normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined for a
    /// relative root.
    pub fn new(root: &Path) -> StorageResult<Self> {
        let root = normalize_path(&std::path::absolute(root)?);
        let json = root.join("_json");
        Ok(Self {
            entries: json.join(RecordKind::Entry.dir_name()),
            comments: json.join(RecordKind::Comment.dir_name()),
            indexes: json.join("indexes"),
            media: root.join("media"),
            userinfo: json.join("userinfo.js"),
            usernames: json.join("usernames.js"),
            json,
            root,
        })
    }

    /// Directory holding records of `kind`.
    #[must_use]
    pub fn kind_dir(&self, kind: RecordKind) -> &Path {
        match kind {
            RecordKind::Entry => &self.entries,
            RecordKind::Comment => &self.comments,
        }
    }

    /// File holding record `id` of `kind`.
    #[must_use]
    pub fn record_path(&self, kind: RecordKind, id: u64) -> PathBuf {
        self.kind_dir(kind).join(format!("{id}.{RECORD_EXTENSION}"))
    }
}

/// Everything the store knows, as loaded from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreIndex {
    pub entries: BTreeMap<u64, Entry>,
    pub comments: BTreeMap<u64, Comment>,
    pub userinfo: UserInfo,
    pub usernames: UsernameMap,
    pub indexes: BTreeMap<String, IndexDocument>,
}

/// A record type with its own directory and numeric id.
pub trait Record: Serialize + DeserializeOwned + Sized + 'static {
    const KIND: RecordKind;

    fn id(&self) -> u64;

    fn slot(index: &StoreIndex) -> &BTreeMap<u64, Self>;

    fn slot_mut(index: &mut StoreIndex) -> &mut BTreeMap<u64, Self>;
}

impl Record for Entry {
    const KIND: RecordKind = RecordKind::Entry;

    fn id(&self) -> u64 {
        self.itemid
    }

    fn slot(index: &StoreIndex) -> &BTreeMap<u64, Self> {
        &index.entries
    }

    fn slot_mut(index: &mut StoreIndex) -> &mut BTreeMap<u64, Self> {
        &mut index.entries
    }
}

impl Record for Comment {
    const KIND: RecordKind = RecordKind::Comment;

    fn id(&self) -> u64 {
        self.comment_id
    }

    fn slot(index: &StoreIndex) -> &BTreeMap<u64, Self> {
        &index.comments
    }

    fn slot_mut(index: &mut StoreIndex) -> &mut BTreeMap<u64, Self> {
        &mut index.comments
    }
}

/// Load the full index from disk.
///
/// Pure with respect to the store handle: the result depends only on the
/// files under `layout`. Missing files and directories load as empty.
///
/// # Errors
///
/// Returns an error if a record file cannot be read or decoded.
pub fn load_index(layout: &StoreLayout) -> StorageResult<StoreIndex> {
    info!("Loading data from {}", layout.json.display());
    let mut index = StoreIndex::default();

    if layout.userinfo.exists() {
        index.userinfo = read_record(&layout.userinfo)?;
        debug!(username = %index.userinfo.username, "Userinfo preloaded");
    }

    if layout.usernames.exists() {
        index.usernames = read_record(&layout.usernames)?;
        debug!("{} stored usernames preloaded", index.usernames.len());
    }

    load_kind::<Entry>(layout, &mut index)?;
    debug!("{} stored entries preloaded", index.entries.len());

    load_kind::<Comment>(layout, &mut index)?;
    debug!(
        max_comment_id = index.comments.keys().next_back().copied().unwrap_or(0),
        "{} stored comments preloaded",
        index.comments.len()
    );

    for path in list_record_files(&layout.indexes)? {
        let doc: IndexDocument = read_record(&path)?;
        debug!(
            "{} stored rows preloaded from {}.js",
            doc.rows.len(),
            doc.meta.descriptor
        );
        index.indexes.insert(doc.meta.descriptor.clone(), doc);
    }

    Ok(index)
}

fn load_kind<R: Record>(layout: &StoreLayout, index: &mut StoreIndex) -> StorageResult<()> {
    let slot = R::slot_mut(index);
    for path in list_record_files(layout.kind_dir(R::KIND))? {
        let record: R = read_record(&path)?;
        slot.insert(record.id(), record);
    }
    Ok(())
}

/// Handle to one account's backup on disk.
#[derive(Debug)]
pub struct JournalStore {
    layout: StoreLayout,
    index: StoreIndex,
    modified: bool,
}

impl JournalStore {
    /// Open (creating directories as needed) and load the store at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created or existing
    /// records fail to load.
    pub fn open(root: &Path) -> StorageResult<Self> {
        let layout = StoreLayout::new(root)?;
        for dir in [&layout.entries, &layout.comments] {
            fs::create_dir_all(dir)?;
        }
        let index = load_index(&layout)?;
        Ok(Self {
            layout,
            index,
            modified: false,
        })
    }

    #[must_use]
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    /// Whether anything was written since the last load.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Repopulate the index from disk.
    ///
    /// Skipped when nothing was written since the last load and `force` is
    /// false. Returns whether a reload happened.
    ///
    /// # Errors
    ///
    /// Returns an error if records fail to load; the current index is kept.
    pub fn reload(&mut self, force: bool) -> StorageResult<bool> {
        if !self.modified && !force {
            debug!("Storage seems to be intact, skip reloading");
            return Ok(false);
        }
        self.index = load_index(&self.layout)?;
        self.modified = false;
        Ok(true)
    }

    /// Persist a record under its id, replacing any previous copy.
    ///
    /// The record is encoded first; an encoding failure leaves both the
    /// file and the index untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the atomic write fails.
    pub fn put<R: Record>(&mut self, record: R) -> StorageResult<WriteOutcome> {
        let id = record.id();
        let encoded = encode_record(&record)?;
        let path = self.sandboxed(&self.layout.record_path(R::KIND, id))?;
        let outcome = atomic_write(&path, &encoded)?;
        debug!(kind = %R::KIND, id, ?outcome, "Record stored");
        R::slot_mut(&mut self.index).insert(id, record);
        self.modified |= outcome.is_change();
        Ok(outcome)
    }

    #[must_use]
    pub fn get<R: Record>(&self, id: u64) -> Option<&R> {
        R::slot(&self.index).get(&id)
    }

    #[must_use]
    pub fn contains<R: Record>(&self, id: u64) -> bool {
        R::slot(&self.index).contains_key(&id)
    }

    /// All records of one kind in ascending id order.
    pub fn all<R: Record>(&self) -> impl Iterator<Item = &R> {
        R::slot(&self.index).values()
    }

    /// Highest comment id stored so far, 0 when there are none.
    #[must_use]
    pub fn max_comment_id(&self) -> u64 {
        self.index.comments.keys().next_back().copied().unwrap_or(0)
    }

    /// Comments of one entry in ascending id order.
    #[must_use]
    pub fn comments_for_entry(&self, entry_id: u64) -> Vec<&Comment> {
        self.index
            .comments
            .values()
            .filter(|c| c.entry_id == entry_id)
            .collect()
    }

    #[must_use]
    pub fn userinfo(&self) -> &UserInfo {
        &self.index.userinfo
    }

    /// Shallow-merge `info` into the stored user info and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn merge_userinfo(&mut self, info: UserInfo) -> StorageResult<WriteOutcome> {
        let mut merged = self.index.userinfo.clone();
        merged.merge(info);
        let outcome = self.write_singleton(&self.layout.userinfo.clone(), &merged)?;
        self.index.userinfo = merged;
        Ok(outcome)
    }

    #[must_use]
    pub fn usernames(&self) -> &UsernameMap {
        &self.index.usernames
    }

    /// Merge poster names (last writer wins per id) and persist the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn merge_usernames(&mut self, usermap: &UsernameMap) -> StorageResult<WriteOutcome> {
        let mut merged = self.index.usernames.clone();
        merged.extend(usermap.iter().map(|(id, name)| (*id, name.clone())));
        let outcome = self.write_singleton(&self.layout.usernames.clone(), &merged)?;
        self.index.usernames = merged;
        Ok(outcome)
    }

    #[must_use]
    pub fn indexes(&self) -> &BTreeMap<String, IndexDocument> {
        &self.index.indexes
    }

    /// Persist an index document as `indexes/<descriptor>.js`.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor escapes the index directory or
    /// the file cannot be written.
    pub fn save_index(&mut self, doc: IndexDocument) -> StorageResult<WriteOutcome> {
        let indexes = self.ensure_dir(&self.layout.indexes.clone())?;
        let filename = format!("{}.{RECORD_EXTENSION}", doc.meta.descriptor);
        let outcome = self.save_file(&indexes, &filename, &encode_record(&doc)?)?;
        debug!(
            "Saved index {filename} with {} rows ({outcome:?})",
            doc.rows.len()
        );
        self.index.indexes.insert(doc.meta.descriptor.clone(), doc);
        Ok(outcome)
    }

    /// Create a directory inside the store root.
    ///
    /// Relative paths are taken relative to the root. Returns the resolved
    /// absolute path.
    ///
    /// # Errors
    ///
    /// Returns `PathViolation` without touching the filesystem if the path
    /// resolves outside the root.
    pub fn ensure_dir(&self, dir: &Path) -> StorageResult<PathBuf> {
        let dir = self.sandboxed(dir)?;
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Atomically write raw bytes to `dir/filename` inside the store root.
    ///
    /// # Errors
    ///
    /// Returns `PathViolation` without touching the filesystem if the
    /// target resolves outside the root, or an IO error if the write fails.
    pub fn save_file(
        &self,
        dir: &Path,
        filename: &str,
        content: &[u8],
    ) -> StorageResult<WriteOutcome> {
        let path = self.sandboxed(&dir.join(filename))?;
        atomic_write(&path, content)
    }

    /// Totals for status output.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let owner = self.index.userinfo.username.as_str();
        let own_comments = self
            .index
            .comments
            .values()
            .filter(|c| !owner.is_empty() && c.username == owner)
            .count();
        StoreStats {
            entries: self.index.entries.len(),
            comments: self.index.comments.len(),
            own_comments,
            other_comments: self.index.comments.len() - own_comments,
            usernames: self.index.usernames.len(),
            max_comment_id: self.max_comment_id(),
        }
    }

    fn write_singleton<T: Serialize>(
        &mut self,
        path: &Path,
        value: &T,
    ) -> StorageResult<WriteOutcome> {
        let encoded = encode_record(value)?;
        let path = self.sandboxed(path)?;
        let outcome = atomic_write(&path, &encoded)?;
        self.modified |= outcome.is_change();
        Ok(outcome)
    }

    /// Resolve `path` against the root and reject anything outside of it.
    ///
    /// The lexical check catches `..`; the nearest existing ancestor is
    /// then canonicalized so a symlink inside the root cannot lead out.
    fn sandboxed(&self, path: &Path) -> StorageResult<PathBuf> {
        let resolved = normalize_path(&self.layout.root.join(path));
        let violation = || StorageError::PathViolation {
            path: resolved.clone(),
            root: self.layout.root.clone(),
        };
        if !resolved.starts_with(&self.layout.root) {
            return Err(violation());
        }

        let root = fs::canonicalize(&self.layout.root)?;
        let existing = resolved
            .ancestors()
            .find(|p| p.symlink_metadata().is_ok())
            .unwrap_or(self.layout.root.as_path());
        if fs::canonicalize(existing)?.starts_with(&root) {
            Ok(resolved.clone())
        } else {
            Err(violation())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::comment::sample_comment;
    use crate::model::entry::sample_entry;
    use crate::model::timestamp;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, JournalStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = JournalStore::open(&temp_dir.path().join("alice")).unwrap();
        (temp_dir, store)
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.insert(path.clone(), fs::read(&path).unwrap());
                }
            }
        }
        files
    }

    #[test]
    fn test_open_creates_layout() {
        let (_dir, store) = open_store();
        assert!(store.layout().entries.is_dir());
        assert!(store.layout().comments.is_dir());
        assert!(!store.is_modified());
        assert_eq!(store.max_comment_id(), 0);
    }

    #[test]
    fn test_put_get_contains() {
        let (_dir, mut store) = open_store();
        let entry = sample_entry(100, "2020-01-01 00:00:00");

        assert!(!store.contains::<Entry>(100));
        assert_eq!(store.put(entry.clone()).unwrap(), WriteOutcome::Created);
        assert!(store.contains::<Entry>(100));
        assert_eq!(store.get::<Entry>(100), Some(&entry));
        assert!(store.is_modified());
        assert!(store.layout().record_path(RecordKind::Entry, 100).exists());
    }

    #[test]
    fn test_put_overwrites_by_id() {
        let (_dir, mut store) = open_store();
        let mut entry = sample_entry(7, "2020-01-01 00:00:00");
        store.put(entry.clone()).unwrap();

        entry.event = "edited".into();
        assert_eq!(store.put(entry.clone()).unwrap(), WriteOutcome::Updated);
        assert_eq!(store.all::<Entry>().count(), 1);
        assert_eq!(store.get::<Entry>(7).unwrap().event, "edited");
    }

    #[test]
    fn test_put_same_record_is_idempotent() {
        let (_dir, mut store) = open_store();
        let entry = sample_entry(1, "2020-01-01 00:00:00");
        store.put(entry.clone()).unwrap();
        store.reload(true).unwrap();
        let before = snapshot(store.root());

        assert_eq!(store.put(entry).unwrap(), WriteOutcome::Unchanged);
        assert!(!store.is_modified());
        assert_eq!(snapshot(store.root()), before);
    }

    #[test]
    fn test_reload_round_trips_everything() {
        let (dir, mut store) = open_store();
        let mut entry = sample_entry(100, "2020-01-01 00:00:00");
        entry.sync_time = Some(timestamp::parse("2020-01-02 00:00:00").unwrap());
        store.put(entry).unwrap();
        store.put(sample_comment(5, 100, 0, None)).unwrap();
        store.put(sample_comment(9, 100, 5, Some("D"))).unwrap();
        store
            .merge_usernames(&UsernameMap::from([(50, "user5".to_string())]))
            .unwrap();
        store
            .merge_userinfo(UserInfo {
                username: "alice".into(),
                ..UserInfo::default()
            })
            .unwrap();

        let reopened = JournalStore::open(&dir.path().join("alice")).unwrap();
        assert_eq!(reopened.index, store.index);
        assert_eq!(reopened.max_comment_id(), 9);
        assert_eq!(reopened.comments_for_entry(100).len(), 2);
        assert_eq!(reopened.userinfo().username, "alice");
    }

    #[test]
    fn test_reload_skips_when_unmodified() {
        let (_dir, mut store) = open_store();
        assert!(!store.reload(false).unwrap());
        assert!(store.reload(true).unwrap());

        store.put(sample_entry(1, "2020-01-01 00:00:00")).unwrap();
        assert!(store.reload(false).unwrap());
        assert!(!store.is_modified());
    }

    #[test]
    fn test_reload_sees_external_changes_only_when_forced() {
        let (_dir, mut store) = open_store();
        let path = store.layout().record_path(RecordKind::Entry, 3);
        fs::write(&path, encode_record(&sample_entry(3, "2021-01-01 00:00:00")).unwrap()).unwrap();

        store.reload(false).unwrap();
        assert!(!store.contains::<Entry>(3));
        store.reload(true).unwrap();
        assert!(store.contains::<Entry>(3));
    }

    #[test]
    fn test_crashed_write_is_never_visible() {
        let (dir, mut store) = open_store();
        let entry = sample_entry(42, "2020-01-01 00:00:00");
        store.put(entry.clone()).unwrap();

        // A write that died before the rename leaves only its temp file.
        let target = store.layout().record_path(RecordKind::Entry, 42);
        fs::write(crate::storage::file::temp_path_for(&target), b"{\"itemid\": 42, \"ev").unwrap();

        let reopened = JournalStore::open(&dir.path().join("alice")).unwrap();
        assert_eq!(reopened.get::<Entry>(42), Some(&entry));
        assert_eq!(reopened.all::<Entry>().count(), 1);
    }

    #[test]
    fn test_usernames_merge_last_writer_wins() {
        let (_dir, mut store) = open_store();
        store
            .merge_usernames(&UsernameMap::from([(1, "old".into()), (2, "two".into())]))
            .unwrap();
        store
            .merge_usernames(&UsernameMap::from([(1, "new".into())]))
            .unwrap();

        assert_eq!(store.usernames().get(&1).map(String::as_str), Some("new"));
        assert_eq!(store.usernames().get(&2).map(String::as_str), Some("two"));
    }

    #[test]
    fn test_ensure_dir_rejects_escape() {
        let (dir, store) = open_store();
        let outside = dir.path().join("elsewhere");

        let result = store.ensure_dir(Path::new("../elsewhere"));
        assert!(matches!(result, Err(StorageError::PathViolation { .. })));
        assert!(!outside.exists());

        let result = store.ensure_dir(&outside);
        assert!(matches!(result, Err(StorageError::PathViolation { .. })));
        assert!(!outside.exists());

        let inside = store.ensure_dir(Path::new("media/example.org")).unwrap();
        assert!(inside.starts_with(store.root()));
        assert!(inside.is_dir());
    }

    #[test]
    fn test_save_file_rejects_escape() {
        let (dir, store) = open_store();
        let result = store.save_file(Path::new("media"), "../../escaped.txt", b"x");

        assert!(matches!(result, Err(StorageError::PathViolation { .. })));
        assert!(!dir.path().join("escaped.txt").exists());
        assert!(!store.root().join("media").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_rejected() {
        let (dir, store) = open_store();
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, store.root().join("media")).unwrap();

        let result = store.save_file(Path::new("media"), "leak.txt", b"x");
        assert!(matches!(result, Err(StorageError::PathViolation { .. })));
        assert!(!outside.join("leak.txt").exists());

        let result = store.ensure_dir(Path::new("media/nested"));
        assert!(matches!(result, Err(StorageError::PathViolation { .. })));
        assert!(!outside.join("nested").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_within_root_is_allowed() {
        let (_dir, store) = open_store();
        let target = store.root().join("files");
        fs::create_dir_all(&target).unwrap();
        std::os::unix::fs::symlink(&target, store.root().join("media")).unwrap();

        store.save_file(Path::new("media"), "pic.txt", b"x").unwrap();
        assert!(target.join("pic.txt").exists());
    }

    #[test]
    fn test_all_lists_records_in_id_order() {
        let (_dir, mut store) = open_store();
        for id in [3, 1, 2] {
            store.put(sample_entry(id, "2020-01-01 00:00:00")).unwrap();
        }

        let ids: Vec<u64> = store.all::<Entry>().map(|e| e.itemid).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.all::<Comment>().count(), 0);
    }

    #[test]
    fn test_stats_counts_own_comments() {
        let (_dir, mut store) = open_store();
        store
            .merge_userinfo(UserInfo {
                username: "user2".into(),
                ..UserInfo::default()
            })
            .unwrap();
        store.put(sample_entry(1, "2020-01-01 00:00:00")).unwrap();
        store.put(sample_comment(1, 1, 0, None)).unwrap();
        store.put(sample_comment(2, 1, 1, None)).unwrap();
        store.put(sample_comment(3, 1, 0, None)).unwrap();

        let stats = store.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.comments, 3);
        assert_eq!(stats.own_comments, 1);
        assert_eq!(stats.other_comments, 2);
        assert_eq!(stats.max_comment_id, 3);
    }
}
