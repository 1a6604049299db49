//! evkit Test Utilities
//!
//! Centralized test infrastructure for the evkit workspace:
//! - Proptest generators for brands, records and payloads
//! - Mock transports and scripted dispatchers
//! - Test fixtures for common scenarios

pub use evkit_core::{
    Brand, BrandConfig, BrandContext, BrandId, BrandRegistry, Dispatch, Envelope, ErrorCode,
    EventRecord, Failure, NewAnalyticsEvent, NewEvent, NewShortlink, RouteTarget, Shortlink,
    Transport, TransportError,
};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// What a [`MockTransport`] does when a method is called.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Resolve with this raw value.
    Value(Value),
    /// Fail with this transport error.
    Fail(TransportError),
    /// Panic while invoking the method.
    Panic(String),
}

/// A call observed by a mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub payload: Value,
}

/// Scripted transport. Methods without a script behave like a missing
/// host method.
#[derive(Debug)]
pub struct MockTransport {
    name: String,
    available: AtomicBool,
    outcomes: Mutex<HashMap<String, MockOutcome>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: AtomicBool::new(true),
            outcomes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A transport whose host capability is absent.
    pub fn unavailable(name: impl Into<String>) -> Self {
        let transport = Self::new(name);
        transport.set_available(false);
        transport
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn script(&self, method: impl Into<String>, outcome: MockOutcome) -> &Self {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(method.into(), outcome);
        self
    }

    pub fn respond(&self, method: impl Into<String>, value: Value) -> &Self {
        self.script(method, MockOutcome::Value(value))
    }

    pub fn fail(&self, method: impl Into<String>, error: TransportError) -> &Self {
        self.script(method, MockOutcome::Fail(error))
    }

    pub fn panic_on(&self, method: impl Into<String>, message: impl Into<String>) -> &Self {
        self.script(method, MockOutcome::Panic(message.into()))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn call(&self, target: &RouteTarget, payload: Value) -> Result<Value, TransportError> {
        let method = target.method_name();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                method: method.clone(),
                payload,
            });
        let outcome = self
            .outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&method)
            .cloned();
        match outcome {
            Some(MockOutcome::Value(value)) => Ok(value),
            Some(MockOutcome::Fail(error)) => Err(error),
            Some(MockOutcome::Panic(message)) => panic!("{}", message),
            None => Err(TransportError::MissingMethod { method }),
        }
    }
}

// ============================================================================
// SCRIPTED DISPATCH
// ============================================================================

/// Dispatcher that answers from a queue of envelopes.
///
/// When the queue is empty every call answers INTERNAL. A gated dispatcher
/// holds each answer until the gate is notified once per call.
#[derive(Debug, Default)]
pub struct ScriptedDispatch {
    responses: Mutex<VecDeque<Envelope>>,
    calls: Mutex<Vec<RecordedCall>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: impl IntoIterator<Item = Envelope>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Hold every answer until the returned gate is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn push(&self, envelope: Envelope) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(envelope);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Dispatch for ScriptedDispatch {
    async fn dispatch(&self, method: &str, payload: Value) -> Envelope {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                method: method.to_string(),
                payload,
            });
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Envelope::internal(format!("no scripted response for {}", method)))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map};
    use uuid::Uuid;

    // === Brand Generators ===

    pub fn arb_brand_id() -> impl Strategy<Value = BrandId> {
        prop::sample::select(BrandId::ALL.to_vec())
    }

    /// Raw brand input: known ids, case variants, junk and injection-shaped text.
    pub fn arb_raw_brand() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            arb_brand_id().prop_map(|b| Some(b.as_str().to_string())),
            arb_brand_id().prop_map(|b| Some(b.as_str().to_uppercase())),
            Just(Some("' OR '1'='1".to_string())),
            Just(Some("abc; DROP TABLE events".to_string())),
            Just(Some("<script>root</script>".to_string())),
            "[a-zA-Z0-9_ -]{0,12}".prop_map(Some),
        ]
    }

    // === Record Generators ===

    pub fn arb_shortlink() -> impl Strategy<Value = Shortlink> {
        (arb_brand_id(), "[a-z0-9-]{1,10}").prop_map(|(brand, token)| {
            BrandContext::for_route(brand).create(NewShortlink {
                target_url: format!("https://{}.example/{}", brand, token),
                token,
                event_id: None,
            })
        })
    }

    pub fn arb_event() -> impl Strategy<Value = EventRecord> {
        (arb_brand_id(), "[A-Za-z ]{1,24}").prop_map(|(brand, name)| {
            BrandContext::for_route(brand).create(NewEvent {
                name,
                date: None,
                location: None,
            })
        })
    }

    // === Method and Payload Generators ===

    /// Path-style method: `resource/action`.
    pub fn arb_path_method() -> impl Strategy<Value = String> {
        ("[a-z]{1,10}", "[a-zA-Z]{1,12}").prop_map(|(r, a)| format!("{}/{}", r, a))
    }

    /// Legacy flat method: `api_<name>`.
    pub fn arb_legacy_method() -> impl Strategy<Value = String> {
        "[a-zA-Z]{1,16}".prop_map(|name| format!("api_{}", name))
    }

    /// Flat JSON object payload with scalar fields.
    pub fn arb_payload() -> impl Strategy<Value = Value> {
        prop::collection::btree_map(
            "[a-zA-Z]{1,8}",
            prop_oneof![
                any::<i64>().prop_map(|n| json!(n)),
                "[ -~]{0,12}".prop_map(Value::String),
                any::<bool>().prop_map(Value::Bool),
                Just(Value::Null),
            ],
            0..6,
        )
        .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<String, Value>>()))
    }

    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<u128>().prop_map(Uuid::from_u128)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    /// Admin key used for `brand` in fixtures.
    pub fn admin_key(brand: BrandId) -> String {
        format!("{}-admin-key", brand)
    }

    pub fn brand_configs() -> Vec<BrandConfig> {
        BrandId::ALL
            .iter()
            .map(|b| BrandConfig {
                id: b.as_str().to_string(),
                admin_key: admin_key(*b),
            })
            .collect()
    }

    pub fn registry() -> BrandRegistry {
        BrandRegistry::new(
            BrandId::ALL
                .iter()
                .map(|b| Brand::new(*b, admin_key(*b)))
                .collect(),
        )
        .unwrap_or_else(|e| panic!("fixture registry must be valid: {}", e))
    }

    pub fn event(brand: BrandId, name: &str) -> EventRecord {
        BrandContext::for_route(brand).create(NewEvent {
            name: name.to_string(),
            date: Some("2026-05-01".to_string()),
            location: Some("Main Hall".to_string()),
        })
    }

    pub fn shortlink(brand: BrandId, token: &str, target_url: &str) -> Shortlink {
        BrandContext::for_route(brand).create(NewShortlink {
            token: token.to_string(),
            target_url: target_url.to_string(),
            event_id: None,
        })
    }

    pub fn analytics(
        brand: BrandId,
        event: &EventRecord,
        surface: &str,
        metric: &str,
        count: u64,
    ) -> evkit_core::AnalyticsRecord {
        BrandContext::for_route(brand).create(NewAnalyticsEvent {
            event_id: event.id,
            surface: surface.to_string(),
            metric: metric.to_string(),
            sponsor_id: None,
            count,
        })
    }
}
