//! Brand isolation guard for reads over tenant-scoped collections.
//!
//! Every lookup here takes the target brand as raw caller input and filters
//! to exactly one brand. A missing, empty or unrecognized target yields
//! nothing; there is no path that returns records across brands.

use crate::brand::BrandId;
use crate::envelope::Failure;
use crate::identity::EntityId;
use crate::records::{AnalyticsRecord, BrandScoped, EventRecord, Shortlink};
use serde::Serialize;
use std::collections::BTreeMap;

/// Records whose brand equals `target`.
pub fn filter_by_brand<'a, R: BrandScoped>(records: &'a [R], target: Option<&str>) -> Vec<&'a R> {
    let Some(brand) = target.and_then(BrandId::parse) else {
        return Vec::new();
    };
    records.iter().filter(|r| r.brand_id() == brand).collect()
}

/// Look up an event by id inside one brand.
pub fn find_event<'a>(
    events: &'a [EventRecord],
    brand: Option<&str>,
    id: EntityId,
) -> Result<&'a EventRecord, Failure> {
    filter_by_brand(events, brand)
        .into_iter()
        .find(|e| e.id == id)
        .ok_or_else(|| Failure::not_found(format!("Event {} not found", id)))
}

/// Resolve a shortlink token inside one brand.
pub fn resolve_shortlink<'a>(
    links: &'a [Shortlink],
    brand: Option<&str>,
    token: &str,
) -> Option<&'a Shortlink> {
    filter_by_brand(links, brand)
        .into_iter()
        .find(|l| l.token == token)
}

/// Totals over one brand's analytics records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub brand_id: Option<BrandId>,
    pub total: u64,
    pub by_metric: BTreeMap<String, u64>,
    pub by_surface: BTreeMap<String, u64>,
    pub by_event: BTreeMap<EntityId, u64>,
}

/// Aggregate analytics for one brand. Unknown brands aggregate nothing.
///
/// Sums saturate instead of overflowing.
pub fn aggregate_analytics(records: &[AnalyticsRecord], brand: Option<&str>) -> AnalyticsSummary {
    let mut summary = AnalyticsSummary {
        brand_id: brand.and_then(BrandId::parse),
        ..Default::default()
    };
    for record in filter_by_brand(records, brand) {
        summary.total = summary.total.saturating_add(record.count);
        bump(summary.by_metric.entry(record.metric.clone()).or_default(), record.count);
        bump(summary.by_surface.entry(record.surface.clone()).or_default(), record.count);
        bump(summary.by_event.entry(record.event_id).or_default(), record.count);
    }
    summary
}

// Counts come from caller payloads; totals pin at u64::MAX.
fn bump(slot: &mut u64, count: u64) {
    *slot = slot.saturating_add(count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{NewAnalyticsEvent, NewEvent, NewShortlink};
    use crate::{BrandContext, ErrorCode};
    use uuid::Uuid;

    fn link(brand: BrandId, token: &str, url: &str) -> Shortlink {
        BrandContext::for_route(brand).create(NewShortlink {
            token: token.to_string(),
            target_url: url.to_string(),
            event_id: None,
        })
    }

    fn hit(brand: BrandId, event_id: Uuid, surface: &str, metric: &str, count: u64) -> AnalyticsRecord {
        BrandContext::for_route(brand).create(NewAnalyticsEvent {
            event_id,
            surface: surface.to_string(),
            metric: metric.to_string(),
            sponsor_id: None,
            count,
        })
    }

    #[test]
    fn test_filter_fails_closed() {
        let links = vec![
            link(BrandId::Abc, "a", "https://a"),
            link(BrandId::Cbc, "b", "https://b"),
        ];
        assert!(filter_by_brand(&links, None).is_empty());
        assert!(filter_by_brand(&links, Some("")).is_empty());
        assert!(filter_by_brand(&links, Some("ABC")).is_empty());
        assert!(filter_by_brand(&links, Some("abc' OR 1=1 --")).is_empty());
        assert!(filter_by_brand(&links, Some("*")).is_empty());

        let abc = filter_by_brand(&links, Some("abc"));
        assert_eq!(abc.len(), 1);
        assert_eq!(abc[0].token, "a");
    }

    #[test]
    fn test_same_token_resolves_per_brand() {
        let links = vec![
            link(BrandId::Abc, "same-token", "https://abc.example/x"),
            link(BrandId::Cbc, "same-token", "https://cbc.example/y"),
        ];

        let abc = resolve_shortlink(&links, Some("abc"), "same-token").expect("abc link");
        assert_eq!(abc.target_url, "https://abc.example/x");

        let cbc = resolve_shortlink(&links, Some("cbc"), "same-token").expect("cbc link");
        assert_eq!(cbc.target_url, "https://cbc.example/y");

        assert!(resolve_shortlink(&links, Some("root"), "same-token").is_none());
        assert!(resolve_shortlink(&links, None, "same-token").is_none());
    }

    #[test]
    fn test_find_event_is_not_found_across_brands() {
        let event = BrandContext::for_route(BrandId::Abc).create(NewEvent {
            name: "Gala".to_string(),
            date: None,
            location: None,
        });
        let events = vec![event.clone()];

        let found = find_event(&events, Some("abc"), event.id).expect("own brand");
        assert_eq!(found.name, "Gala");

        let err = find_event(&events, Some("cbc"), event.id).expect_err("other brand");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_aggregate_analytics_stays_in_brand() {
        let event_a = Uuid::now_v7();
        let event_b = Uuid::now_v7();
        let records = vec![
            hit(BrandId::Abc, event_a, "display", "impression", 3),
            hit(BrandId::Abc, event_a, "public", "click", 1),
            hit(BrandId::Cbc, event_b, "display", "impression", 100),
        ];

        let summary = aggregate_analytics(&records, Some("abc"));
        assert_eq!(summary.brand_id, Some(BrandId::Abc));
        assert_eq!(summary.total, 4);
        assert_eq!(summary.by_metric.get("impression"), Some(&3));
        assert_eq!(summary.by_surface.get("public"), Some(&1));
        assert_eq!(summary.by_event.get(&event_a), Some(&4));
        assert!(!summary.by_event.contains_key(&event_b));

        let none = aggregate_analytics(&records, Some("Abc"));
        assert_eq!(none, AnalyticsSummary::default());
    }

    #[test]
    fn test_aggregate_analytics_saturates_huge_counts() {
        let event = Uuid::now_v7();
        let records = vec![
            hit(BrandId::Abc, event, "display", "impression", u64::MAX),
            hit(BrandId::Abc, event, "display", "impression", 1),
            hit(BrandId::Abc, event, "public", "click", 5),
        ];

        let summary = aggregate_analytics(&records, Some("abc"));
        assert_eq!(summary.total, u64::MAX);
        assert_eq!(summary.by_metric.get("impression"), Some(&u64::MAX));
        assert_eq!(summary.by_metric.get("click"), Some(&5));
        assert_eq!(summary.by_surface.get("display"), Some(&u64::MAX));
        assert_eq!(summary.by_event.get(&event), Some(&u64::MAX));
    }
}
