//! Stale-while-revalidate cache manager.
//!
//! [`SwrCache::swr`] serves the cached value for a call (if any), then
//! revalidates it with exactly one conditional dispatch. Notifications go
//! through the caller's `on_update` callback and are always asynchronous
//! with respect to the `swr` call itself. Within one call the cached value
//! is always reported before the network value.
//!
//! ```ignore
//! let task = cache.swr("events/list", json!({"brandId": "abc"}),
//!     SwrOptions::new().on_update(|events| render(events)));
//! // ... later, optionally:
//! let report = task.join().await;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use evkit_core::{Dispatch, Envelope, Failure, StoreError, Success, IF_NONE_MATCH};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use super::entry::CacheEntry;
use super::key::CacheKey;
use crate::store::KeyValueStore;

/// Default namespace tag for SWR keys.
pub const DEFAULT_NAMESPACE: &str = "evkit.swr";

/// Callback receiving cached or fresh data.
pub type UpdateFn = Arc<dyn Fn(&Value) + Send + Sync>;

/// Configuration for the SWR cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace tag prefixed to every key.
    pub namespace: String,
    /// Staleness threshold used when a call does not supply one.
    pub default_stale: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_stale: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_default_stale(mut self, stale: Duration) -> Self {
        self.default_stale = stale;
        self
    }
}

/// Per-call options.
///
/// `stale` is informational: the cached value is served regardless of age
/// and revalidation always happens. Its effect is the `cached_fresh` flag
/// of the [`SwrReport`].
#[derive(Clone, Default)]
pub struct SwrOptions {
    pub stale: Option<Duration>,
    pub on_update: Option<UpdateFn>,
}

impl SwrOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stale(mut self, stale: Duration) -> Self {
        self.stale = Some(stale);
        self
    }

    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_update = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for SwrOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwrOptions")
            .field("stale", &self.stale)
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}

/// How the revalidation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SwrOutcome {
    /// A fresh value was stored and delivered.
    Refreshed { etag: Option<String> },
    /// A fresh value was delivered but the store rejected it.
    NotStored {
        etag: Option<String>,
        error: StoreError,
    },
    /// The backend confirmed the cached copy; nothing changed.
    NotModified,
    /// The backend answered ok without a value; nothing changed.
    Empty,
    /// The backend (or transport) failed; nothing changed.
    Failed(Failure),
    /// The revalidation did not complete (panicking callback, no runtime).
    Aborted { reason: String },
}

/// Summary of one SWR call.
#[derive(Debug, Clone, PartialEq)]
pub struct SwrReport {
    pub key: CacheKey,
    /// Whether a cached value was delivered before revalidation.
    pub served_cached: bool,
    /// Whether the cached value was younger than the staleness threshold.
    pub cached_fresh: Option<bool>,
    pub outcome: SwrOutcome,
}

/// Handle to an in-flight revalidation.
///
/// Dropping the handle does not cancel the work; the task runs to
/// completion and notifications still arrive.
#[derive(Debug)]
pub struct SwrTask {
    key: CacheKey,
    state: TaskState,
}

#[derive(Debug)]
enum TaskState {
    Running(JoinHandle<SwrReport>),
    Settled(Box<SwrReport>),
}

impl SwrTask {
    /// A task that never ran, with `report` as its result.
    pub fn settled(report: SwrReport) -> Self {
        Self {
            key: report.key.clone(),
            state: TaskState::Settled(Box::new(report)),
        }
    }

    /// A task that was refused before reading the cache.
    pub fn failed(key: CacheKey, failure: Failure) -> Self {
        Self::settled(SwrReport {
            key,
            served_cached: false,
            cached_fresh: None,
            outcome: SwrOutcome::Failed(failure),
        })
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            TaskState::Running(handle) => handle.is_finished(),
            TaskState::Settled(_) => true,
        }
    }

    /// Wait for revalidation to finish.
    pub async fn join(self) -> SwrReport {
        let handle = match self.state {
            TaskState::Running(handle) => handle,
            TaskState::Settled(report) => return *report,
        };
        match handle.await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "SWR revalidation task aborted");
                SwrReport {
                    key: self.key,
                    served_cached: false,
                    cached_fresh: None,
                    outcome: SwrOutcome::Aborted {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    /// Let the revalidation run unobserved.
    pub fn detach(self) {}
}

/// Stale-while-revalidate cache over a dispatcher and an opaque store.
pub struct SwrCache<D: ?Sized> {
    dispatcher: Arc<D>,
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
}

impl<D: ?Sized> Clone for SwrCache<D> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<D> SwrCache<D>
where
    D: Dispatch + ?Sized + 'static,
{
    pub fn new(dispatcher: Arc<D>, store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self {
            dispatcher,
            store,
            config,
        }
    }

    pub fn with_defaults(dispatcher: Arc<D>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(dispatcher, store, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn key_for(&self, method: &str, payload: &Value) -> CacheKey {
        CacheKey::derive(&self.config.namespace, method, payload)
    }

    /// Serve the cached value for `method`/`payload` and revalidate it.
    ///
    /// The cache is read synchronously; everything else happens on a task
    /// spawned on the current Tokio runtime. Without a runtime nothing is
    /// read or delivered and the task settles as `Aborted`.
    pub fn swr(&self, method: &str, payload: Value, options: SwrOptions) -> SwrTask {
        let key = self.key_for(method, &payload);
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(%key, error = %e, "SWR call outside a Tokio runtime");
                return SwrTask::settled(SwrReport {
                    key,
                    served_cached: false,
                    cached_fresh: None,
                    outcome: SwrOutcome::Aborted {
                        reason: e.to_string(),
                    },
                });
            }
        };
        let cached = self.read_entry(&key);
        let stale_after = options.stale.unwrap_or(self.config.default_stale);
        let request = conditional_payload(payload, cached.as_ref().and_then(|e| e.etag.clone()));

        let dispatcher = Arc::clone(&self.dispatcher);
        let store = Arc::clone(&self.store);
        let method = method.to_string();
        let task_key = key.clone();
        let on_update = options.on_update;

        let handle = runtime.spawn(async move {
            let cached_fresh = cached.as_ref().map(|e| e.is_fresh(stale_after));
            let served_cached = cached.is_some();

            if let Some(entry) = &cached {
                tokio::task::yield_now().await;
                if let Some(notify) = &on_update {
                    notify(&entry.data);
                }
            }

            let outcome = match dispatcher.dispatch(&method, request).await {
                Envelope::Ok(success) if success.not_modified => {
                    tracing::debug!(%key, "SWR cache confirmed current");
                    SwrOutcome::NotModified
                }
                Envelope::Ok(Success {
                    value: Some(value),
                    etag,
                    ..
                }) => {
                    let entry = CacheEntry::new(value, etag);
                    let stored = write_entry(store.as_ref(), &key, &entry);
                    if let Some(notify) = &on_update {
                        notify(&entry.data);
                    }
                    match stored {
                        Ok(()) => SwrOutcome::Refreshed { etag: entry.etag },
                        Err(error) => SwrOutcome::NotStored {
                            etag: entry.etag,
                            error,
                        },
                    }
                }
                Envelope::Ok(_) => SwrOutcome::Empty,
                Envelope::Err(failure) => {
                    tracing::debug!(%key, code = %failure.code, "SWR revalidation failed");
                    SwrOutcome::Failed(failure)
                }
            };

            SwrReport {
                key,
                served_cached,
                cached_fresh,
                outcome,
            }
        });

        SwrTask {
            key: task_key,
            state: TaskState::Running(handle),
        }
    }

    /// Cached entry for a call, without touching the network.
    pub fn peek(&self, method: &str, payload: &Value) -> Option<CacheEntry> {
        self.read_entry(&self.key_for(method, payload))
    }

    /// Drop the cached entry for one call.
    pub fn invalidate(&self, method: &str, payload: &Value) -> Result<(), StoreError> {
        self.store.remove(self.key_for(method, payload).as_str())
    }

    /// Drop every cached entry for `method`, returning how many were removed.
    pub fn invalidate_method(&self, method: &str) -> Result<usize, StoreError> {
        let prefix = CacheKey::method_prefix(&self.config.namespace, method);
        let keys = self.store.keys_with_prefix(&prefix)?;
        for key in &keys {
            self.store.remove(key)?;
        }
        Ok(keys.len())
    }

    fn read_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        let raw = match self.store.get(key.as_str()) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(%key, error = %e, "SWR cache read failed; treating as miss");
                return None;
            }
        };
        match CacheEntry::from_json(&raw) {
            Ok(entry) if entry.data.is_null() => None,
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(%key, error = %e, "Corrupt SWR cache entry; treating as miss");
                None
            }
        }
    }
}

fn write_entry(
    store: &dyn KeyValueStore,
    key: &CacheKey,
    entry: &CacheEntry,
) -> Result<(), StoreError> {
    let result = entry
        .to_json()
        .map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
        .and_then(|encoded| store.set(key.as_str(), &encoded));
    if let Err(e) = &result {
        tracing::warn!(%key, error = %e, "Failed to persist SWR cache entry");
    }
    result
}

/// Payload with `ifNoneMatch` set to `etag`, or removed when there is none.
fn conditional_payload(payload: Value, etag: Option<String>) -> Value {
    match (payload, etag) {
        (Value::Object(mut map), Some(etag)) => {
            map.insert(IF_NONE_MATCH.to_string(), Value::String(etag));
            Value::Object(map)
        }
        (Value::Object(mut map), None) => {
            map.remove(IF_NONE_MATCH);
            Value::Object(map)
        }
        (Value::Null, Some(etag)) => {
            let mut map = Map::new();
            map.insert(IF_NONE_MATCH.to_string(), Value::String(etag));
            Value::Object(map)
        }
        (other, _) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use evkit_core::ErrorCode;
    use evkit_test_utils::ScriptedDispatch;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, SwrOptions) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let options = SwrOptions::new().on_update(move |v| {
            sink.lock().expect("lock").push(v.clone());
        });
        (seen, options)
    }

    fn cache_with(
        dispatch: Arc<ScriptedDispatch>,
    ) -> (SwrCache<ScriptedDispatch>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = SwrCache::with_defaults(dispatch, store.clone());
        (cache, store)
    }

    #[test]
    fn test_conditional_payload() {
        assert_eq!(
            conditional_payload(json!({"id": 1}), Some("v1".to_string())),
            json!({"id": 1, "ifNoneMatch": "v1"})
        );
        assert_eq!(
            conditional_payload(json!({"id": 1, "ifNoneMatch": "old"}), None),
            json!({"id": 1})
        );
        assert_eq!(
            conditional_payload(Value::Null, Some("v1".to_string())),
            json!({"ifNoneMatch": "v1"})
        );
        assert_eq!(conditional_payload(json!([1]), Some("v".to_string())), json!([1]));
    }

    #[tokio::test]
    async fn test_cold_miss_stores_and_notifies_once() {
        let dispatch = Arc::new(ScriptedDispatch::with_responses([Envelope::ok_with_etag(
            json!(["e1"]),
            "v1",
        )]));
        let (cache, store) = cache_with(dispatch.clone());
        let (seen, options) = recorder();

        let report = cache.swr("events/list", json!({"brandId": "abc"}), options).join().await;

        assert!(!report.served_cached);
        assert_eq!(report.outcome, SwrOutcome::Refreshed { etag: Some("v1".to_string()) });
        assert_eq!(*seen.lock().expect("lock"), vec![json!(["e1"])]);
        assert_eq!(store.len(), 1);
        let calls = dispatch.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].payload, json!({"brandId": "abc"}));
    }

    #[tokio::test]
    async fn test_notification_is_never_synchronous() {
        let dispatch = Arc::new(ScriptedDispatch::with_responses([
            Envelope::ok_with_etag(json!(1), "v1"),
            Envelope::ok_with_etag(json!(2), "v2"),
        ]));
        let (cache, _store) = cache_with(dispatch);
        cache.swr("m", json!({}), SwrOptions::new()).join().await;

        let (seen, options) = recorder();
        let task = cache.swr("m", json!({}), options);
        assert!(seen.lock().expect("lock").is_empty());
        task.join().await;
        assert_eq!(*seen.lock().expect("lock"), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_untouched() {
        let dispatch = Arc::new(ScriptedDispatch::with_responses([
            Envelope::ok_with_etag(json!("old"), "v1"),
            Envelope::fail(ErrorCode::RateLimited, "slow down"),
        ]));
        let (cache, _store) = cache_with(dispatch);
        cache.swr("m", json!({}), SwrOptions::new()).join().await;

        let (seen, options) = recorder();
        let report = cache.swr("m", json!({}), options).join().await;

        assert_eq!(
            report.outcome,
            SwrOutcome::Failed(Failure::rate_limited("slow down"))
        );
        assert_eq!(*seen.lock().expect("lock"), vec![json!("old")]);
        let entry = cache.peek("m", &json!({})).expect("entry kept");
        assert_eq!(entry.data, json!("old"));
        assert_eq!(entry.etag.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dispatch = Arc::new(ScriptedDispatch::with_responses([Envelope::ok(json!(7))]));
        let (cache, store) = cache_with(dispatch.clone());
        let key = cache.key_for("m", &json!({}));
        store.set(key.as_str(), "{broken").expect("set");

        let (seen, options) = recorder();
        let report = cache.swr("m", json!({}), options).join().await;

        assert!(!report.served_cached);
        assert_eq!(*seen.lock().expect("lock"), vec![json!(7)]);
        assert!(dispatch.calls()[0].payload.get(IF_NONE_MATCH).is_none());
    }

    #[tokio::test]
    async fn test_stale_threshold_only_reported() {
        let dispatch = Arc::new(ScriptedDispatch::with_responses([
            Envelope::ok_with_etag(json!(1), "v1"),
            Envelope::not_modified(Some("v1".to_string())),
        ]));
        let (cache, _store) = cache_with(dispatch.clone());
        cache.swr("m", json!({}), SwrOptions::new()).join().await;

        let report = cache
            .swr("m", json!({}), SwrOptions::new().stale(Duration::ZERO))
            .join()
            .await;
        assert!(report.served_cached);
        assert_eq!(report.cached_fresh, Some(false));
        assert_eq!(report.outcome, SwrOutcome::NotModified);
        assert_eq!(dispatch.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_callback_reports_aborted() {
        let dispatch = Arc::new(ScriptedDispatch::with_responses([Envelope::ok(json!(1))]));
        let (cache, _store) = cache_with(dispatch);
        let options = SwrOptions::new().on_update(|_| panic!("render failed"));
        let report = cache.swr("m", json!({}), options).join().await;
        assert!(matches!(report.outcome, SwrOutcome::Aborted { .. }));
    }

    #[tokio::test]
    async fn test_invalidate_and_invalidate_method() {
        let dispatch = Arc::new(ScriptedDispatch::with_responses([
            Envelope::ok(json!(1)),
            Envelope::ok(json!(2)),
            Envelope::ok(json!(3)),
        ]));
        let (cache, store) = cache_with(dispatch);
        cache.swr("events/get", json!({"id": "a"}), SwrOptions::new()).join().await;
        cache.swr("events/get", json!({"id": "b"}), SwrOptions::new()).join().await;
        cache.swr("events/list", json!({}), SwrOptions::new()).join().await;
        assert_eq!(store.len(), 3);

        cache.invalidate("events/list", &json!({})).expect("invalidate");
        assert!(cache.peek("events/list", &json!({})).is_none());
        assert_eq!(cache.invalidate_method("events/get").expect("invalidate"), 2);
        assert!(store.is_empty());
    }
    struct RejectingStore;

    impl KeyValueStore for RejectingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend {
                reason: "disk full".to_string(),
            })
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }

        fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_rejected_write_is_reported_not_refreshed() {
        let dispatch = Arc::new(ScriptedDispatch::with_responses([Envelope::ok_with_etag(
            json!(["e1"]),
            "v1",
        )]));
        let cache = SwrCache::with_defaults(dispatch, Arc::new(RejectingStore));
        let (seen, options) = recorder();

        let report = cache.swr("events/list", json!({}), options).join().await;

        assert_eq!(
            report.outcome,
            SwrOutcome::NotStored {
                etag: Some("v1".to_string()),
                error: StoreError::Backend {
                    reason: "disk full".to_string()
                },
            }
        );
        assert_eq!(*seen.lock().expect("lock"), vec![json!(["e1"])]);
    }

    #[test]
    fn test_swr_outside_runtime_settles_aborted() {
        let dispatch = Arc::new(ScriptedDispatch::with_responses([Envelope::ok(json!(1))]));
        let (cache, store) = cache_with(dispatch.clone());
        let (seen, options) = recorder();

        let task = cache.swr("m", json!({}), options);
        assert!(task.is_finished());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let report = runtime.block_on(task.join());
        assert!(matches!(report.outcome, SwrOutcome::Aborted { .. }));
        assert!(!report.served_cached);
        assert!(seen.lock().expect("lock").is_empty());
        assert_eq!(dispatch.call_count(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_task_is_already_settled() {
        let key = CacheKey::derive(DEFAULT_NAMESPACE, "m", &json!({}));
        let task = SwrTask::failed(key.clone(), Failure::bad_input("unknown brand"));
        assert!(task.is_finished());
        assert_eq!(task.key(), &key);
        let report = task.join().await;
        assert_eq!(report.outcome, SwrOutcome::Failed(Failure::bad_input("unknown brand")));
    }
}
