//! Data models for journal backups.
//!
//! This module contains the persisted record types:
//! - Entry (journal post)
//! - Comment
//! - UserInfo (account owner)
//! - UsernameMap (poster id → display name)
//!
//! Every record has an explicit schema for the fields the backup relies on
//! plus an open `extra` map, so fields the remote adds later survive a
//! round-trip through the store untouched.

pub mod comment;
pub mod entry;
pub mod timestamp;
pub mod user;

pub use comment::{Comment, CommentState};
pub use entry::Entry;
pub use user::{UserInfo, UsernameMap};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Interpret a loosely typed id field.
///
/// Accepts JSON numbers and numeric strings. Anything else (empty string,
/// null, garbage) is `None`.
#[must_use]
pub fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Deserialize an optional id that may arrive as a number or a string.
pub(crate) fn lenient_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_id_forms() {
        assert_eq!(parse_id(&json!(42)), Some(42));
        assert_eq!(parse_id(&json!("42")), Some(42));
        assert_eq!(parse_id(&json!(" 7 ")), Some(7));
        assert_eq!(parse_id(&json!("")), None);
        assert_eq!(parse_id(&json!("abc")), None);
        assert_eq!(parse_id(&json!(null)), None);
        assert_eq!(parse_id(&json!(-3)), None);
    }
}
