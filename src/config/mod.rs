//! Configuration management.
//!
//! Settings are resolved in this order:
//!
//! 1. Command-line flag (clap also fills flags from `JB_ROOT`,
//!    `JB_ACCOUNT`, `JB_ENDPOINT`, `JB_TOKEN`)
//! 2. `~/.journal-backup/config.json`
//! 3. Built-in default (only the backup root has one:
//!    `~/.journal-backup/backups`)
//!
//! Each account is backed up into its own store at `<root>/<account>`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::remote::http::DEFAULT_TIMEOUT;

/// Contents of `config.json`. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Get the global directory, `~/.journal-backup/`.
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".journal-backup"))
}

/// Get the config file path.
fn config_path() -> Result<PathBuf> {
    global_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or(Error::Config("Could not determine home directory".into()))
}

/// Load the global config file; a missing file is an empty config.
///
/// # Errors
///
/// Returns `Error::Config` if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path()?)
}

/// Load a config file from an explicit path.
///
/// # Errors
///
/// Returns `Error::Config` if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {e}", path.display())))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file {}: {e}", path.display())))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

/// Resolve the directory holding all account stores.
///
/// # Errors
///
/// Returns `Error::Config` if no root is given and the home directory
/// cannot be determined.
pub fn resolve_root(explicit: Option<&Path>, config: &ConfigFile) -> Result<PathBuf> {
    if let Some(path) = explicit.or(config.root.as_deref()) {
        return Ok(path.to_path_buf());
    }
    global_dir()
        .map(|dir| dir.join("backups"))
        .ok_or(Error::Config("Could not determine home directory".into()))
}

/// Resolve and validate the account name.
///
/// # Errors
///
/// Returns `MissingAccount` if none is configured, or `InvalidArgument` if
/// the name is not usable as a directory name.
pub fn resolve_account(explicit: Option<&str>, config: &ConfigFile) -> Result<String> {
    let account = non_empty(explicit)
        .or_else(|| non_empty(config.account.as_deref()))
        .ok_or(Error::MissingAccount)?;
    validate_account(&account)?;
    Ok(account)
}

/// Resolve the remote endpoint base URL.
///
/// # Errors
///
/// Returns `MissingEndpoint` if none is configured, or `InvalidArgument`
/// if it is not an http(s) URL.
pub fn resolve_endpoint(explicit: Option<&str>, config: &ConfigFile) -> Result<String> {
    let endpoint = non_empty(explicit)
        .or_else(|| non_empty(config.endpoint.as_deref()))
        .ok_or(Error::MissingEndpoint)?;
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(Error::InvalidArgument(format!(
            "endpoint must be an http(s) URL, got {endpoint:?}"
        )));
    }
    Ok(endpoint)
}

/// Resolve the bearer token, if any.
#[must_use]
pub fn resolve_token(explicit: Option<&str>, config: &ConfigFile) -> Option<String> {
    non_empty(explicit).or_else(|| non_empty(config.token.as_deref()))
}

#[must_use]
pub fn resolve_timeout(config: &ConfigFile) -> Duration {
    config
        .timeout_secs
        .filter(|secs| *secs > 0)
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
}

/// Account names become a directory under the root.
fn validate_account(account: &str) -> Result<()> {
    let valid = account
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !account.starts_with('-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "account must contain only letters, digits, '_' and '-', got {account:?}"
        )))
    }
}

/// Store directory of one account.
#[must_use]
pub fn store_path(root: &Path, account: &str) -> PathBuf {
    root.join(account)
}
