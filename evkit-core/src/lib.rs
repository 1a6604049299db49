//! evkit Core - Envelope Protocol and Brand Isolation
//!
//! Shared types for the evkit call layer. All other crates depend on this.
//! This crate holds the wire envelope, the error taxonomy, the brand model
//! with its isolation guard, HTML escaping, and the seam traits
//! ([`Transport`], [`Dispatch`]) that the client and storage crates meet at.

pub mod brand;
pub mod config;
pub mod envelope;
pub mod error;
pub mod escape;
pub mod identity;
pub mod isolation;
pub mod records;
pub mod rpc;

pub use brand::{check_brand_consistency, AdminKey, Brand, BrandContext, BrandId, BrandRegistry};
pub use config::BrandConfig;
pub use envelope::{Envelope, ErrorCode, Failure, Success};
pub use error::{BrandError, ConfigError, EvkitError, EvkitResult, StoreError, TransportError};
pub use escape::{escape_html, escape_str, escape_value};
pub use identity::{new_entity_id, EntityId, Timestamp};
pub use isolation::{
    aggregate_analytics, filter_by_brand, find_event, resolve_shortlink, AnalyticsSummary,
};
pub use records::{
    AnalyticsRecord, BrandScoped, BrandScopedDraft, EventRecord, NewAnalyticsEvent, NewEvent,
    NewShortlink, Shortlink,
};
pub use rpc::{Dispatch, RouteTarget, Transport};

/// Payload field carrying the conditional-fetch token.
pub const IF_NONE_MATCH: &str = "ifNoneMatch";
