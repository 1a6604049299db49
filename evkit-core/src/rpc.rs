//! Seam traits for the call layer.
//!
//! [`Transport`] is the injected host capability that actually performs a
//! remote call. [`Dispatch`] is the never-failing call primitive built on top
//! of it; the SWR cache depends only on this trait.

use crate::envelope::Envelope;
use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Backend entry point selected for a logical method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteTarget {
    /// Path-style `<resource>/<action>`.
    Path { resource: String, action: String },
    /// Legacy flat method name, passed through untouched.
    Legacy { name: String },
}

impl RouteTarget {
    /// Method name as the caller spelled it.
    pub fn method_name(&self) -> String {
        match self {
            RouteTarget::Path { resource, action } => format!("{}/{}", resource, action),
            RouteTarget::Legacy { name } => name.clone(),
        }
    }

    /// Relative endpoint path on an HTTP host.
    pub fn endpoint(&self) -> String {
        match self {
            RouteTarget::Path { resource, action } => format!("api/{}/{}", resource, action),
            RouteTarget::Legacy { name } => format!("rpc/{}", name),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, RouteTarget::Legacy { .. })
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.method_name())
    }
}

/// Host capability that performs a remote call.
///
/// Returns the raw success value (expected to be an envelope) or a typed
/// error. Implementations report absence through [`Transport::is_available`]
/// or [`TransportError::Unavailable`] rather than panicking.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name used in diagnostics and in the "not available" message.
    fn name(&self) -> &str;

    /// Whether the host capability is present.
    fn is_available(&self) -> bool {
        true
    }

    async fn call(&self, target: &RouteTarget, payload: Value) -> Result<Value, TransportError>;
}

/// Never-failing call primitive.
///
/// Every outcome, including transport absence and failures, is an envelope.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, method: &str, payload: Value) -> Envelope;
}

#[async_trait]
impl<D: Dispatch + ?Sized> Dispatch for Arc<D> {
    async fn dispatch(&self, method: &str, payload: Value) -> Envelope {
        (**self).dispatch(method, payload).await
    }
}
