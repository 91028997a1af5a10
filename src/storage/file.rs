//! Atomic file operations for the store.
//!
//! This module provides safe file operations that prevent data corruption:
//! - Atomic writes: write to a hidden temp file, sync to disk, then rename
//! - Deterministic record encoding (sorted keys, 4-space indent)
//! - Lexical path normalization for the root sandbox

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::storage::hash::{content_hash, file_hash};
use crate::storage::types::{StorageError, StorageResult, WriteOutcome};

/// Extension of every record file.
pub const RECORD_EXTENSION: &str = "js";

/// Encode a record as pretty JSON with stable key order.
///
/// The record is first converted to a `serde_json::Value`, whose object maps
/// are ordered by key, then printed with a 4-space indent and a trailing
/// newline. Encoding the same data twice yields identical bytes.
///
/// # Errors
///
/// Returns an error if the record cannot be represented as JSON (for
/// example a map with non-string keys).
pub fn encode_record<T: Serialize>(record: &T) -> StorageResult<Vec<u8>> {
    let value = serde_json::to_value(record)?;
    let mut out = Vec::with_capacity(256);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

/// Read and decode one record file.
///
/// # Errors
///
/// Returns `InvalidRecord` with the offending path if the content does not
/// decode, or an IO error if the file cannot be read.
pub fn read_record<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let content = fs::read(path)?;
    serde_json::from_slice(&content).map_err(|e| StorageError::InvalidRecord {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Hidden sibling used while a write is in flight.
///
/// `dir/123.js` is staged as `dir/.123.js.tmp`, which the loader never
/// picks up.
#[must_use]
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write content to a file atomically.
///
/// This function:
/// 1. Compares the content hash against the existing file and returns
///    `Unchanged` without writing when they match
/// 2. Writes content to a hidden temporary sibling
/// 3. Calls `fsync` to ensure data is on disk
/// 4. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> StorageResult<WriteOutcome> {
    let existing = file_hash(path)?;
    if existing.as_deref() == Some(content_hash(content).as_str()) {
        return Ok(WriteOutcome::Unchanged);
    }

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);

    // Write to temp file
    let written = (|| -> std::io::Result<()> {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        // Sync to disk before rename
        writer.get_ref().sync_all()
    })();

    if let Err(e) = written.and_then(|()| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(if existing.is_some() {
        WriteOutcome::Updated
    } else {
        WriteOutcome::Created
    })
}

/// List record files (`*.js`) in a directory, sorted by path.
///
/// A missing directory yields an empty list. Hidden files (in-flight temp
/// files) are skipped.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn list_record_files(dir: &Path) -> StorageResult<Vec<PathBuf>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for dir_entry in read_dir {
        let path = dir_entry?.path();
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXTENSION);
        if is_record && !hidden && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` above the first component is kept so that the result still
/// compares as outside of any root it escapes.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_reports_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.js");

        assert_eq!(atomic_write(&path, b"one\n").unwrap(), WriteOutcome::Created);
        assert_eq!(atomic_write(&path, b"one\n").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(atomic_write(&path, b"two\n").unwrap(), WriteOutcome::Updated);

        assert_eq!(fs::read_to_string(&path).unwrap(), "two\n");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a").join("b").join("2.js");

        atomic_write(&path, b"{}\n").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_encode_record_sorts_keys_and_indents() {
        let encoded = encode_record(&json!({"b": 1, "a": {"z": true, "y": [1, 2]}})).unwrap();
        let text = String::from_utf8(encoded).unwrap();

        assert_eq!(
            text,
            "{\n    \"a\": {\n        \"y\": [\n            1,\n            2\n        ],\n        \"z\": true\n    },\n    \"b\": 1\n}\n"
        );
    }

    #[test]
    fn test_read_record_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.js");
        fs::write(&path, "{ not json").unwrap();

        let result: StorageResult<serde_json::Value> = read_record(&path);
        match result {
            Err(StorageError::InvalidRecord { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected InvalidRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_list_record_files_skips_temp_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("2.js"), "{}").unwrap();
        fs::write(dir.join("10.js"), "{}").unwrap();
        fs::write(dir.join(".3.js.tmp"), "{").unwrap();
        fs::write(dir.join("notes.txt"), "x").unwrap();

        let files = list_record_files(dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["10.js", "2.js"]);

        assert!(list_record_files(&dir.join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize_path(Path::new("/a/../../etc")), PathBuf::from("/etc"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }
}
