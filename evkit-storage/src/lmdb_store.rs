//! LMDB-backed key-value store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to persist cache entries
//! across process restarts. Keys and values are UTF-8 strings.
//!
//! LMDB caps keys at 511 bytes, while cache keys embed the whole canonical
//! payload. Keys longer than [`MAX_INLINE_KEY`] are stored under a
//! fixed-length form: the leading [`DIGEST_PREFIX`] bytes of the key, `#`,
//! then the hex SHA-256 of the full key. Every value is stored together with
//! its full key, so lookups can reject digest collisions and prefix scans
//! report the keys callers wrote.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions per call:
//! - Read transactions for `get` and `keys_with_prefix`
//! - Write transactions for `set` and `remove`

use std::borrow::Cow;
use std::path::Path;

use evkit_core::StoreError;
use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::KeyValueStore;

/// Longest key stored as-is.
pub const MAX_INLINE_KEY: usize = 448;

/// Bytes of the original key kept in front of a digest.
pub const DIGEST_PREFIX: usize = 383;

/// Error type for LMDB store setup.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for StoreError {
    fn from(e: LmdbStoreError) -> Self {
        StoreError::Backend {
            reason: e.to_string(),
        }
    }
}

fn txn_error(e: heed::Error) -> StoreError {
    StoreError::Backend {
        reason: format!("Transaction error: {}", e),
    }
}

/// Value as written to LMDB.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord<'a> {
    #[serde(borrow)]
    key: Cow<'a, str>,
    #[serde(borrow)]
    value: Cow<'a, str>,
}

impl<'a> StoredRecord<'a> {
    fn encode(key: &'a str, value: &'a str) -> Result<String, StoreError> {
        let record = StoredRecord {
            key: Cow::Borrowed(key),
            value: Cow::Borrowed(value),
        };
        serde_json::to_string(&record).map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn decode(stored_under: &str, raw: &'a str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Serialization {
            key: stored_under.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Longest prefix of `s` that fits in `max` bytes and ends on a char boundary.
fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key actually written to LMDB for `key`.
pub fn physical_key(key: &str) -> Cow<'_, str> {
    if key.len() <= MAX_INLINE_KEY {
        Cow::Borrowed(key)
    } else {
        Cow::Owned(format!(
            "{}#{}",
            truncate_at_boundary(key, DIGEST_PREFIX),
            sha256_hex(key)
        ))
    }
}

/// LMDB-backed store.
///
/// # Example
///
/// ```ignore
/// use evkit_storage::{KeyValueStore, LmdbStore};
///
/// let store = LmdbStore::new("/var/cache/evkit", 64)?;
/// store.set("evkit.swr:events/list:{}", "{...}")?;
/// ```
pub struct LmdbStore {
    env: Env,
    db: Database<Str, Str>,
}

impl LmdbStore {
    /// Open (or create) a store in `path` with a map size of `max_size_mb`.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Str, Str> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "LMDB store opened");

        Ok(Self { env, db })
    }
}

impl KeyValueStore for LmdbStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let physical = physical_key(key);
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let Some(raw) = self.db.get(&rtxn, &*physical).map_err(txn_error)? else {
            return Ok(None);
        };
        let record = StoredRecord::decode(&physical, raw)?;
        if record.key != key {
            tracing::warn!(key = %physical, "LMDB key digest collision; treating as miss");
            return Ok(None);
        }
        Ok(Some(record.value.into_owned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let encoded = StoredRecord::encode(key, value)?;
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .put(&mut wtxn, &*physical_key(key), &encoded)
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .delete(&mut wtxn, &*physical_key(key))
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let scan = truncate_at_boundary(prefix, DIGEST_PREFIX);
        let iter = self.db.prefix_iter(&rtxn, scan).map_err(txn_error)?;
        let mut keys = Vec::new();
        for result in iter {
            let decoded = result
                .map_err(txn_error)
                .and_then(|(physical, raw)| StoredRecord::decode(physical, raw));
            match decoded {
                Ok(record) if record.key.starts_with(prefix) => keys.push(record.key.into_owned()),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable LMDB entry");
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbStore::new(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    #[test]
    fn test_put_and_get() {
        let (store, _dir) = create_test_store();
        store.set("k1", "{\"a\":1}").expect("set");
        assert_eq!(store.get("k1").expect("get"), Some("{\"a\":1}".to_string()));
        assert_eq!(store.get("missing").expect("get"), None);
    }

    #[test]
    fn test_overwrite_and_remove() {
        let (store, _dir) = create_test_store();
        store.set("k", "one").expect("set");
        store.set("k", "two").expect("overwrite");
        assert_eq!(store.get("k").expect("get"), Some("two".to_string()));
        store.remove("k").expect("remove");
        assert_eq!(store.get("k").expect("get"), None);
        store.remove("k").expect("removing twice is fine");
    }

    #[test]
    fn test_keys_with_prefix() {
        let (store, _dir) = create_test_store();
        store.set("evkit.swr:a", "1").expect("set");
        store.set("evkit.swr:b", "2").expect("set");
        store.set("other:c", "3").expect("set");
        let keys = store.keys_with_prefix("evkit.swr:").expect("keys");
        assert_eq!(keys, vec!["evkit.swr:a".to_string(), "evkit.swr:b".to_string()]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store = LmdbStore::new(temp_dir.path(), 10).expect("open");
            store.set("durable", "yes").expect("set");
        }
        let store = LmdbStore::new(temp_dir.path(), 10).expect("reopen");
        assert_eq!(store.get("durable").expect("get"), Some("yes".to_string()));
    }

    fn long_key(tag: &str) -> String {
        format!("evkit.swr:events/list:{{\"filter\":\"{}{}\"}}", "x".repeat(700), tag)
    }

    #[test]
    fn test_physical_key_is_bounded() {
        assert_eq!(physical_key("short"), "short");
        let key = long_key("a");
        let physical = physical_key(&key);
        assert!(physical.len() <= MAX_INLINE_KEY);
        assert!(physical.starts_with("evkit.swr:events/list:"));
        assert_ne!(physical, physical_key(&long_key("b")));

        let wide = format!("k:{}", "é".repeat(400));
        assert!(physical_key(&wide).len() <= MAX_INLINE_KEY);
    }

    #[test]
    fn test_long_keys_round_trip() {
        let (store, _dir) = create_test_store();
        let (a, b) = (long_key("a"), long_key("b"));
        store.set(&a, "first").expect("set long key");
        store.set(&b, "second").expect("set long key");
        assert_eq!(store.get(&a).expect("get"), Some("first".to_string()));
        assert_eq!(store.get(&b).expect("get"), Some("second".to_string()));

        store.remove(&a).expect("remove long key");
        assert_eq!(store.get(&a).expect("get"), None);
        assert_eq!(store.get(&b).expect("get"), Some("second".to_string()));
    }

    #[test]
    fn test_prefix_scan_reports_full_long_keys() {
        let (store, _dir) = create_test_store();
        let long = long_key("a");
        store.set(&long, "1").expect("set");
        store.set("evkit.swr:events/list:{}", "2").expect("set");
        store.set("evkit.swr:events/get:{}", "3").expect("set");

        let keys = store
            .keys_with_prefix("evkit.swr:events/list:")
            .expect("keys");
        assert_eq!(keys, vec![long.clone(), "evkit.swr:events/list:{}".to_string()]);

        let exact = store.keys_with_prefix(&long).expect("keys");
        assert_eq!(exact, vec![long]);
    }
}
