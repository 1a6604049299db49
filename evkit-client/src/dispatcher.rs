//! RPC dispatcher.
//!
//! [`RpcDispatcher::dispatch`] never fails: transport absence, unknown
//! routes, transport failures, panics inside the transport and malformed
//! answers all become `INTERNAL` failure envelopes. Every such failure is
//! also recorded in the dispatcher's [`DiagnosticLog`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use evkit_core::{Dispatch, Envelope, Failure, Transport, TransportError};
use futures_util::FutureExt;
use serde_json::Value;

use crate::diagnostics::{DiagnosticLevel, DiagnosticLog};
use crate::router::RouteTable;

/// Name reported when no transport is configured.
pub const DEFAULT_TRANSPORT_NAME: &str = "host";

pub struct RpcDispatcher {
    transport: Option<Arc<dyn Transport>>,
    transport_name: String,
    routes: RouteTable,
    diagnostics: Arc<DiagnosticLog>,
}

impl RpcDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let transport_name = transport.name().to_string();
        Self {
            transport: Some(transport),
            transport_name,
            routes: RouteTable::default(),
            diagnostics: Arc::new(DiagnosticLog::default()),
        }
    }

    /// A dispatcher with no transport; every call answers "not available".
    pub fn detached(transport_name: impl Into<String>) -> Self {
        Self {
            transport: None,
            transport_name: transport_name.into(),
            routes: RouteTable::default(),
            diagnostics: Arc::new(DiagnosticLog::default()),
        }
    }

    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<DiagnosticLog>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn transport_name(&self) -> &str {
        &self.transport_name
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticLog> {
        &self.diagnostics
    }

    /// Call `method` with `payload`. Always resolves to an envelope.
    pub async fn dispatch(&self, method: &str, payload: Value) -> Envelope {
        let transport = match &self.transport {
            Some(t) if t.is_available() => t,
            _ => {
                return self.fail(
                    method,
                    TransportError::Unavailable {
                        transport: self.transport_name.clone(),
                    },
                )
            }
        };

        let target = match self.routes.lookup(method) {
            Ok(target) => target,
            Err(e) => return self.fail(method, e),
        };

        tracing::debug!(method, target = %target, "Dispatching");

        let call = AssertUnwindSafe(async { transport.call(&target, payload).await })
            .catch_unwind()
            .await;

        let result = match call {
            Ok(result) => result,
            Err(panic) => Err(TransportError::Panicked {
                method: method.to_string(),
                message: panic_message(panic.as_ref()),
            }),
        };

        match result.and_then(|raw| envelope_from_value(method, raw)) {
            Ok(envelope) => envelope,
            Err(e) => self.fail(method, e),
        }
    }

    fn fail(&self, method: &str, error: TransportError) -> Envelope {
        let detail = error.to_string();
        tracing::warn!(method, error = %detail, "Dispatch failed");
        self.diagnostics
            .record(DiagnosticLevel::Error, method, detail);
        Envelope::Err(Failure::from(error))
    }
}

#[async_trait]
impl Dispatch for RpcDispatcher {
    async fn dispatch(&self, method: &str, payload: Value) -> Envelope {
        RpcDispatcher::dispatch(self, method, payload).await
    }
}

/// Read a transport answer as an envelope, trusting its fields.
fn envelope_from_value(method: &str, raw: Value) -> Result<Envelope, TransportError> {
    serde_json::from_value(raw).map_err(|e| TransportError::MalformedEnvelope {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
