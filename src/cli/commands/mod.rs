//! Command implementations.

pub mod backup;
pub mod comments;
pub mod completions;
pub mod reindex;
pub mod status;
pub mod version;

use std::path::{Path, PathBuf};

use crate::config::{ConfigFile, load_config, resolve_account, resolve_root, store_path};
use crate::error::{Error, Result};
use crate::storage::JournalStore;

/// Resolved location of one account's backup.
#[derive(Debug, Clone)]
pub struct Target {
    pub account: String,
    pub path: PathBuf,
    pub config: ConfigFile,
}

/// Resolve root and account from flags and the config file.
///
/// # Errors
///
/// Returns an error if the config file is unreadable or no usable account
/// is configured.
pub fn resolve_target(root: Option<&Path>, account: Option<&str>) -> Result<Target> {
    let config = load_config()?;
    let root = resolve_root(root, &config)?;
    let account = resolve_account(account, &config)?;
    Ok(Target {
        path: store_path(&root, &account),
        account,
        config,
    })
}

/// Open a backup that must already exist.
///
/// # Errors
///
/// Returns `BackupNotFound` if nothing was backed up to the target yet, or
/// a storage error if it fails to load.
pub fn open_existing(target: &Target) -> Result<JournalStore> {
    if !target.path.join("_json").is_dir() {
        return Err(Error::BackupNotFound {
            path: target.path.clone(),
        });
    }
    Ok(JournalStore::open(&target.path)?)
}
