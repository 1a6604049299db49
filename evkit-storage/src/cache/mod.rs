//! Stale-while-revalidate cache.
//!
//! Callers get whatever is cached immediately (asynchronously, through
//! their `on_update` callback) and then the revalidated value once the
//! backend answers. Revalidation is a conditional fetch: the cached etag
//! travels as `ifNoneMatch`, and a `notModified` answer leaves the cache
//! alone.
//!
//! # Keys
//!
//! [`CacheKey`] can only be derived from a namespace, a method and a
//! payload, so two payloads with the same content always share an entry
//! regardless of field order.

pub mod entry;
pub mod key;
pub mod swr;

pub use entry::CacheEntry;
pub use key::{canonical_json, CacheKey};
pub use swr::{
    CacheConfig, SwrCache, SwrOptions, SwrOutcome, SwrReport, SwrTask, UpdateFn, DEFAULT_NAMESPACE,
};
