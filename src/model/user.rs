//! Account owner and poster name records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Poster id → display name. Append-only, merged on every backup.
pub type UsernameMap = BTreeMap<u64, String>;

/// The account owner, as reported at login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,

    /// Userpic URLs owned by the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickwurls: Option<Vec<String>>,

    /// Userpic keywords.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickws: Option<BTreeSet<String>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl UserInfo {
    /// Shallow update: every field present in `other` replaces ours, even
    /// when it is empty.
    ///
    /// `username` is the one exception: an account always has a name, so
    /// an empty one means the remote did not report it.
    pub fn merge(&mut self, other: Self) {
        if !other.username.is_empty() {
            self.username = other.username;
        }
        if other.fullname.is_some() {
            self.fullname = other.fullname;
        }
        if other.pickwurls.is_some() {
            self.pickwurls = other.pickwurls;
        }
        if other.pickws.is_some() {
            self.pickws = other.pickws;
        }
        self.extra.extend(other.extra);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
