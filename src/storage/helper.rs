//! Shared utilities for the Pod implementation

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Current time, the stamp for `createdAt`/`updatedAt`
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Shallow merge: every key present in `patch` replaces the stored value,
/// keys absent from `patch` keep theirs.
pub fn merge_fields(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

/// Apply the timestamp rule: `createdAt` set once, `updatedAt` on every write
pub fn stamp_timestamps(record: &mut Map<String, Value>, at: DateTime<Utc>) {
    let stamp = Value::String(at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
    let has_created = record
        .get("createdAt")
        .map(|v| !v.is_null())
        .unwrap_or(false);
    if !has_created {
        record.insert("createdAt".to_string(), stamp.clone());
    }
    record.insert("updatedAt".to_string(), stamp);
}

/// The last path segment of a member URL, percent-decoded
pub fn member_name(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let name = trimmed.rsplit('/').next()?;
    if name.is_empty() {
        return None;
    }
    Some(
        urlencoding::decode(name)
            .map(|n| n.into_owned())
            .unwrap_or_else(|_| name.to_string()),
    )
}
