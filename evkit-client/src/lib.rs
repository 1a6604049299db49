//! evkit Client - Dispatcher, Router and SWR Facade
//!
//! The call layer surfaces use to talk to the backend: a never-failing RPC
//! dispatcher over an injected transport, a path/legacy router, a bounded
//! diagnostic log, legacy link redirects and a [`Client`] facade combining
//! the dispatcher with the stale-while-revalidate cache and brand checks.

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod http;
pub mod legacy;
pub mod router;
pub mod telemetry;

pub use client::{scope_payload, Client, BRAND_FIELD};
pub use config::{CacheSection, ClientConfig, ConfigLoadError, DiagnosticsConfig};
pub use diagnostics::{DiagnosticEntry, DiagnosticLevel, DiagnosticLog};
pub use dispatcher::{RpcDispatcher, DEFAULT_TRANSPORT_NAME};
pub use error::{ClientError, ClientResult};
pub use host::{CallbackTransport, FailureHandler, HostFailure, HostPrimitive, SuccessHandler};
pub use http::HttpTransport;
pub use legacy::{legacy_page_redirect, map_page, redirect_html};
pub use router::{resolve, RouteTable};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
