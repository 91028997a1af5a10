//! Durable file storage for journal backups.
//!
//! This module provides the persistence layer with:
//! - One JSON file per record, keyed by id
//! - Atomic writes (temp file + fsync + rename)
//! - Change-aware writes (content hash comparison)
//! - A root sandbox for every directory operation
//! - A modified marker so reloads are only done when needed
//!
//! # Submodules
//!
//! - [`journal`] - The store handle and its in-memory index
//! - [`file`] - Atomic file operations and record encoding
//! - [`hash`] - SHA256 content hashing
//! - [`types`] - Errors, record kinds, write outcomes

pub mod file;
pub mod hash;
pub mod journal;
pub mod types;

pub use journal::{JournalStore, Record, StoreIndex, StoreLayout, load_index};
pub use types::{RecordKind, StorageError, StorageResult, StoreStats, WriteOutcome};
