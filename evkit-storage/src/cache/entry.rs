//! Stored cache entries.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted SWR entry: the last successful value for a key, the etag
/// the backend sent with it, and when it was stored.
///
/// Stored as JSON: `{"etag"?: string, "data": any, "storedAt": millis}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    pub data: Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Entry stored now.
    pub fn new(data: Value, etag: Option<String>) -> Self {
        Self {
            etag,
            data,
            stored_at: Utc::now(),
        }
    }

    /// How long ago the entry was stored. Zero for entries stamped in the future.
    pub fn age(&self) -> Duration {
        let now = Utc::now();
        if now > self.stored_at {
            (now - self.stored_at).to_std().unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        }
    }

    /// True while the entry is younger than `stale_after`.
    pub fn is_fresh(&self, stale_after: Duration) -> bool {
        self.age() < stale_after
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
