//! evkit Storage - Opaque Stores and the SWR Cache
//!
//! Persistence for the evkit call layer. The cache only sees a
//! string-keyed [`KeyValueStore`]; [`MemoryStore`] keeps entries in
//! process and [`LmdbStore`] persists them with LMDB.

pub mod cache;
pub mod lmdb_store;
pub mod store;

pub use cache::{
    canonical_json, CacheConfig, CacheEntry, CacheKey, SwrCache, SwrOptions, SwrOutcome,
    SwrReport, SwrTask, UpdateFn, DEFAULT_NAMESPACE,
};
pub use lmdb_store::{LmdbStore, LmdbStoreError};
pub use store::{KeyValueStore, MemoryStore};
