//! Adapter for callback-style host call primitives.
//!
//! Some hosts expose remote calls as "register a success handler and a
//! failure handler, then invoke the method by name". [`CallbackTransport`]
//! turns such a primitive into a [`Transport`] whose `call` resolves exactly
//! once, with whichever continuation fires first.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use evkit_core::{RouteTarget, Transport, TransportError};
use serde_json::Value;
use tokio::sync::oneshot;

/// What a host hands to its failure continuation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostFailure {
    /// An error object with a message.
    Error { message: String },
    /// A bare string.
    Text(String),
    /// Anything else.
    Other(Value),
}

impl HostFailure {
    /// Message used in the failure envelope.
    pub fn message(&self) -> String {
        match self {
            Self::Error { message } => message.clone(),
            Self::Text(text) => text.clone(),
            Self::Other(Value::String(s)) => s.clone(),
            Self::Other(value) => value.to_string(),
        }
    }
}

impl fmt::Display for HostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<HostFailure> for TransportError {
    fn from(failure: HostFailure) -> Self {
        TransportError::Failure {
            message: failure.message(),
        }
    }
}

pub type SuccessHandler = Box<dyn FnOnce(Value) + Send>;
pub type FailureHandler = Box<dyn FnOnce(HostFailure) + Send>;

/// Callback-pair host call primitive.
pub trait HostPrimitive: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the host, and every capability `invoke` needs, is present.
    fn is_present(&self) -> bool;

    /// Invoke `method` with `payload`, answering through one of the handlers.
    ///
    /// An `Err` means the invocation could not be wired at all (for example
    /// the method does not exist); neither handler will fire.
    fn invoke(
        &self,
        method: &str,
        payload: Value,
        on_success: SuccessHandler,
        on_failure: FailureHandler,
    ) -> Result<(), HostFailure>;
}

/// [`Transport`] over a [`HostPrimitive`].
pub struct CallbackTransport<H> {
    host: H,
}

impl<H: HostPrimitive> CallbackTransport<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

type Slot = Arc<Mutex<Option<oneshot::Sender<Result<Value, HostFailure>>>>>;

fn settle(slot: &Slot, outcome: Result<Value, HostFailure>) {
    let sender = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(sender) = sender {
        let _ = sender.send(outcome);
    }
}

#[async_trait]
impl<H: HostPrimitive> Transport for CallbackTransport<H> {
    fn name(&self) -> &str {
        self.host.name()
    }

    fn is_available(&self) -> bool {
        self.host.is_present()
    }

    async fn call(&self, target: &RouteTarget, payload: Value) -> Result<Value, TransportError> {
        let method = target.method_name();
        let (tx, rx) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(tx)));

        let on_success = {
            let slot = Arc::clone(&slot);
            Box::new(move |value: Value| settle(&slot, Ok(value))) as SuccessHandler
        };
        let on_failure = {
            let slot = Arc::clone(&slot);
            Box::new(move |failure: HostFailure| settle(&slot, Err(failure))) as FailureHandler
        };
        // Only the handlers may keep the sender alive.
        drop(slot);

        self.host
            .invoke(&method, payload, on_success, on_failure)
            .map_err(TransportError::from)?;

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(failure)) => Err(failure.into()),
            Err(_) => Err(TransportError::Failure {
                message: format!(
                    "{} dropped the call to {} without answering",
                    self.host.name(),
                    method
                ),
            }),
        }
    }
}
