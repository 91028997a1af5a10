//! Fixed-format timestamp encoding.
//!
//! The journal service reports times as `YYYY-MM-DD HH:MM:SS` without a zone,
//! and stored records keep that exact textual form so repeated backups
//! reproduce byte-identical files. Use with `#[serde(with = "timestamp")]`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serializer, de};

/// Textual form of every stored timestamp.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp in [`FORMAT`].
///
/// # Errors
///
/// Returns a parse error if the string does not match the format.
pub fn parse(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value.trim(), FORMAT)
}

/// Render a timestamp in [`FORMAT`].
#[must_use]
pub fn format(value: &NaiveDateTime) -> String {
    value.format(FORMAT).to_string()
}

pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(FORMAT))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(|e| de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

/// Same encoding for optional fields.
pub mod option {
    use super::{FORMAT, parse};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.collect_str(&ts.format(FORMAT)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => parse(&raw)
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid timestamp '{raw}': {e}"))),
            _ => Ok(None),
        }
    }
}
