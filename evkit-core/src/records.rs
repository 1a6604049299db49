//! Tenant-scoped records: events, analytics events and shortlinks.
//!
//! A record's brand is private and has no setter. The only way to build one
//! is from a draft through [`BrandContext::create`](crate::BrandContext::create),
//! which stamps the context's brand. Drafts have no brand field, so a
//! `brandId` in caller JSON is dropped during deserialization.

use crate::brand::BrandId;
use crate::identity::{new_entity_id, EntityId, Timestamp};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record owned by exactly one brand.
pub trait BrandScoped {
    fn brand_id(&self) -> BrandId;
}

/// Caller-supplied content for a new tenant-scoped record.
pub trait BrandScopedDraft: DeserializeOwned {
    type Record: BrandScoped;

    fn into_record(self, brand_id: BrandId) -> Self::Record;
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub id: EntityId,
    brand_id: BrandId,
    pub name: String,
    pub date: Option<String>,
    pub location: Option<String>,
    pub created_at: Timestamp,
}

impl BrandScoped for EventRecord {
    fn brand_id(&self) -> BrandId {
        self.brand_id
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl BrandScopedDraft for NewEvent {
    type Record = EventRecord;

    fn into_record(self, brand_id: BrandId) -> EventRecord {
        EventRecord {
            id: new_entity_id(),
            brand_id,
            name: self.name,
            date: self.date,
            location: self.location,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// ANALYTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRecord {
    pub id: EntityId,
    brand_id: BrandId,
    pub event_id: EntityId,
    /// Surface that produced the record (public, display, poster, ...).
    pub surface: String,
    /// Metric name (impression, click, dwell, ...).
    pub metric: String,
    pub sponsor_id: Option<String>,
    pub count: u64,
    pub recorded_at: Timestamp,
}

impl BrandScoped for AnalyticsRecord {
    fn brand_id(&self) -> BrandId {
        self.brand_id
    }
}

fn one() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnalyticsEvent {
    pub event_id: EntityId,
    pub surface: String,
    pub metric: String,
    #[serde(default)]
    pub sponsor_id: Option<String>,
    #[serde(default = "one")]
    pub count: u64,
}

impl BrandScopedDraft for NewAnalyticsEvent {
    type Record = AnalyticsRecord;

    fn into_record(self, brand_id: BrandId) -> AnalyticsRecord {
        AnalyticsRecord {
            id: new_entity_id(),
            brand_id,
            event_id: self.event_id,
            surface: self.surface,
            metric: self.metric,
            sponsor_id: self.sponsor_id,
            count: self.count,
            recorded_at: Utc::now(),
        }
    }
}

// ============================================================================
// SHORTLINKS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortlink {
    pub token: String,
    brand_id: BrandId,
    pub target_url: String,
    pub event_id: Option<EntityId>,
    pub created_at: Timestamp,
}

impl BrandScoped for Shortlink {
    fn brand_id(&self) -> BrandId {
        self.brand_id
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShortlink {
    pub token: String,
    pub target_url: String,
    #[serde(default)]
    pub event_id: Option<EntityId>,
}

impl BrandScopedDraft for NewShortlink {
    type Record = Shortlink;

    fn into_record(self, brand_id: BrandId) -> Shortlink {
        Shortlink {
            token: self.token,
            brand_id,
            target_url: self.target_url,
            event_id: self.event_id,
            created_at: Utc::now(),
        }
    }
}
