//! Client facade.
//!
//! Bundles the dispatcher, the SWR cache over it and the brand registry.
//! Brand-scoped calls take the brand from the route (and, for admin calls,
//! from the verified admin key), never from the payload: any `brandId` the
//! caller put in the payload is overwritten. Scoping happens before the SWR
//! cache key is derived, so cached entries never cross brands.

use std::sync::Arc;

use evkit_core::{BrandContext, BrandError, BrandId, BrandRegistry, Envelope, Failure};
use evkit_storage::{
    CacheConfig, KeyValueStore, LmdbStore, MemoryStore, SwrCache, SwrOptions, SwrTask,
};
use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::diagnostics::{DiagnosticLevel, DiagnosticLog};
use crate::dispatcher::RpcDispatcher;
use crate::error::ClientResult;
use crate::http::HttpTransport;
use crate::router::RouteTable;

/// Payload field naming the brand a call is scoped to.
pub const BRAND_FIELD: &str = "brandId";

pub struct Client {
    dispatcher: Arc<RpcDispatcher>,
    cache: SwrCache<RpcDispatcher>,
    registry: BrandRegistry,
}

impl Client {
    pub fn new(
        dispatcher: RpcDispatcher,
        store: Arc<dyn KeyValueStore>,
        cache_config: CacheConfig,
        registry: BrandRegistry,
    ) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let cache = SwrCache::new(Arc::clone(&dispatcher), store, cache_config);
        Self {
            dispatcher,
            cache,
            registry,
        }
    }

    /// Build a client from validated configuration.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let diagnostics = Arc::new(DiagnosticLog::new(config.diagnostics.capacity));
        let routes = match &config.routes {
            Some(routes) => RouteTable::explicit(routes.iter().cloned())?,
            None => RouteTable::open(),
        };

        let dispatcher = match &config.api_base_url {
            Some(url) => {
                let transport = HttpTransport::new(url, config.request_timeout())?;
                RpcDispatcher::new(Arc::new(transport))
            }
            None => RpcDispatcher::detached(config.transport_name.clone()),
        }
        .with_routes(routes)
        .with_diagnostics(diagnostics);

        let store: Arc<dyn KeyValueStore> = match &config.cache.store_path {
            Some(path) => Arc::new(LmdbStore::new(path, config.cache.max_size_mb)?),
            None => Arc::new(MemoryStore::new()),
        };

        let cache_config = CacheConfig::new()
            .with_namespace(config.cache.namespace.clone())
            .with_default_stale(config.default_stale());

        let registry = BrandRegistry::from_config(&config.brands)?;

        tracing::debug!(
            transport = dispatcher.transport_name(),
            brands = registry.brands().count(),
            persistent_cache = config.cache.store_path.is_some(),
            "Client ready"
        );

        Ok(Self::new(dispatcher, store, cache_config, registry))
    }

    pub fn dispatcher(&self) -> &RpcDispatcher {
        &self.dispatcher
    }

    pub fn cache(&self) -> &SwrCache<RpcDispatcher> {
        &self.cache
    }

    pub fn registry(&self) -> &BrandRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticLog> {
        self.dispatcher.diagnostics()
    }

    /// Plain call; always resolves to an envelope.
    pub async fn call(&self, method: &str, payload: Value) -> Envelope {
        self.dispatcher.dispatch(method, payload).await
    }

    /// Unscoped stale-while-revalidate call.
    pub fn swr(&self, method: &str, payload: Value, options: SwrOptions) -> SwrTask {
        self.cache.swr(method, payload, options)
    }

    /// Stale-while-revalidate call scoped to the brand named in the route.
    ///
    /// A rejected brand or payload settles the task as `Failed` without
    /// reading the cache; its key is the method's key for a null payload.
    pub fn brand_swr(
        &self,
        path_brand: &str,
        method: &str,
        payload: Value,
        options: SwrOptions,
    ) -> SwrTask {
        let scoped = path_brand
            .parse::<BrandId>()
            .and_then(|brand| scope_payload(payload, brand));
        match scoped {
            Ok(payload) => self.cache.swr(method, payload, options),
            Err(e) => {
                let failure = self.record_rejection(method, &e);
                SwrTask::failed(self.cache.key_for(method, &Value::Null), failure)
            }
        }
    }

    /// Public call scoped to the brand named in the route.
    pub async fn brand_call(&self, path_brand: &str, method: &str, payload: Value) -> Envelope {
        let context = match path_brand.parse::<BrandId>() {
            Ok(brand) => BrandContext::for_route(brand),
            Err(e) => return self.reject(method, e),
        };
        self.scoped_call(&context, method, payload).await
    }

    /// Privileged call: the admin key must belong to the brand in the route.
    pub async fn admin_call(
        &self,
        path_brand: &str,
        admin_key: Option<&str>,
        method: &str,
        payload: Value,
    ) -> Envelope {
        match self.registry.authorize(path_brand, admin_key) {
            Ok(context) => self.scoped_call(&context, method, payload).await,
            Err(e) => self.reject(method, e),
        }
    }

    async fn scoped_call(&self, context: &BrandContext, method: &str, payload: Value) -> Envelope {
        match scope_payload(payload, context.brand_id()) {
            Ok(payload) => self.dispatcher.dispatch(method, payload).await,
            Err(e) => self.reject(method, e),
        }
    }

    fn reject(&self, method: &str, error: BrandError) -> Envelope {
        Envelope::Err(self.record_rejection(method, &error))
    }

    fn record_rejection(&self, method: &str, error: &BrandError) -> Failure {
        tracing::warn!(method, error = %error, "Brand check rejected call");
        self.diagnostics()
            .record(DiagnosticLevel::Warn, method, error.to_string());
        Failure::from(error.clone())
    }
}

/// Set the payload's brand field to `brand`, replacing any caller value.
pub fn scope_payload(payload: Value, brand: BrandId) -> Result<Value, BrandError> {
    let mut map = match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(BrandError::InvalidPayload {
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            })
        }
    };
    map.insert(BRAND_FIELD.to_string(), Value::String(brand.as_str().to_string()));
    Ok(Value::Object(map))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
