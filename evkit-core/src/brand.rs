//! Brand (tenant) model and admin credential checks.
//!
//! The set of brands is closed: [`BrandId`] is an enum, so a brand can only
//! be named by parsing a string that matches one of the known ids exactly.
//! Anything else, including case variants and injection-shaped input, simply
//! fails to parse.

use crate::config::BrandConfig;
use crate::error::{BrandError, ConfigError};
use crate::records::BrandScopedDraft;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a brand. Comparison is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandId {
    Root,
    Abc,
    Cbc,
    Cbl,
}

impl BrandId {
    /// Every known brand.
    pub const ALL: [BrandId; 4] = [BrandId::Root, BrandId::Abc, BrandId::Cbc, BrandId::Cbl];

    pub fn as_str(&self) -> &'static str {
        match self {
            BrandId::Root => "root",
            BrandId::Abc => "abc",
            BrandId::Cbc => "cbc",
            BrandId::Cbl => "cbl",
        }
    }

    /// Parse a raw brand id. Returns `None` for anything outside the closed set.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == raw)
    }
}

impl fmt::Display for BrandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrandId {
    type Err = BrandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BrandId::parse(s).ok_or_else(|| BrandError::UnknownBrand { raw: s.to_string() })
    }
}

/// Per-brand admin credential. Never printed.
pub struct AdminKey(SecretString);

impl AdminKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Exact comparison against a candidate key.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.expose_secret() == candidate
    }

    fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminKey([REDACTED])")
    }
}

/// A brand and its admin credential.
#[derive(Debug)]
pub struct Brand {
    pub id: BrandId,
    pub admin_key: AdminKey,
}

impl Brand {
    pub fn new(id: BrandId, admin_key: impl Into<String>) -> Self {
        Self {
            id,
            admin_key: AdminKey::new(admin_key),
        }
    }
}

/// Registry of brands and their admin keys.
///
/// Construction rejects duplicate ids, empty keys and keys shared between
/// brands, so a key can never validate for more than one brand.
#[derive(Debug)]
pub struct BrandRegistry {
    brands: BTreeMap<BrandId, AdminKey>,
}

impl BrandRegistry {
    pub fn new(brands: Vec<Brand>) -> Result<Self, ConfigError> {
        let mut registered: BTreeMap<BrandId, AdminKey> = BTreeMap::new();
        for brand in brands {
            if brand.admin_key.expose().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("brands.{}.admin_key", brand.id),
                    reason: "must not be empty".to_string(),
                });
            }
            if registered.contains_key(&brand.id) {
                return Err(ConfigError::DuplicateBrand {
                    brand: brand.id.to_string(),
                });
            }
            if let Some((other, _)) = registered
                .iter()
                .find(|(_, key)| key.matches(brand.admin_key.expose()))
            {
                return Err(ConfigError::DuplicateAdminKey {
                    brand: brand.id.to_string(),
                    other: other.to_string(),
                });
            }
            registered.insert(brand.id, brand.admin_key);
        }
        Ok(Self { brands: registered })
    }

    /// Build a registry from configuration entries.
    pub fn from_config(entries: &[BrandConfig]) -> Result<Self, ConfigError> {
        let mut brands = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = BrandId::parse(&entry.id).ok_or_else(|| ConfigError::InvalidValue {
                field: "brands.id".to_string(),
                reason: format!("unknown brand '{}'", entry.id),
            })?;
            brands.push(Brand::new(id, entry.admin_key.clone()));
        }
        Self::new(brands)
    }

    /// Brands with a registered key.
    pub fn brands(&self) -> impl Iterator<Item = BrandId> + '_ {
        self.brands.keys().copied()
    }

    pub fn contains(&self, brand: BrandId) -> bool {
        self.brands.contains_key(&brand)
    }

    /// True only if `candidate` is exactly the key registered for `brand`.
    pub fn is_admin_key_valid(&self, brand: &str, candidate: Option<&str>) -> bool {
        let Some(brand) = BrandId::parse(brand) else {
            return false;
        };
        let Some(candidate) = candidate.filter(|c| !c.is_empty()) else {
            return false;
        };
        self.brands
            .get(&brand)
            .is_some_and(|key| key.matches(candidate))
    }

    /// The brand a key belongs to, if any.
    pub fn brand_for_key(&self, candidate: &str) -> Option<BrandId> {
        if candidate.is_empty() {
            return None;
        }
        self.brands
            .iter()
            .find(|(_, key)| key.matches(candidate))
            .map(|(brand, _)| *brand)
    }

    /// Authorize a privileged request for the brand named in its path.
    ///
    /// Unknown brand and a key belonging to another brand are `BAD_INPUT`;
    /// a missing or unrecognized key is `UNAUTHORIZED`.
    pub fn authorize(
        &self,
        path_brand: &str,
        admin_key: Option<&str>,
    ) -> Result<BrandContext, BrandError> {
        let requested: BrandId = path_brand.parse()?;
        let candidate = admin_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| BrandError::MissingAdminKey {
                brand: requested.to_string(),
            })?;
        let key_brand =
            self.brand_for_key(candidate)
                .ok_or_else(|| BrandError::InvalidAdminKey {
                    brand: requested.to_string(),
                })?;
        check_brand_consistency(requested, key_brand)?;
        Ok(BrandContext {
            brand_id: requested,
            authenticated: true,
        })
    }
}

/// Reject when the brand in the request differs from the brand of the key.
pub fn check_brand_consistency(requested: BrandId, key_brand: BrandId) -> Result<(), BrandError> {
    if requested == key_brand {
        Ok(())
    } else {
        Err(BrandError::BrandMismatch {
            requested: requested.to_string(),
            key_brand: key_brand.to_string(),
        })
    }
}

/// Brand context of a request, taken from routing and authentication.
///
/// Tenant-scoped records get their brand from here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrandContext {
    brand_id: BrandId,
    authenticated: bool,
}

impl BrandContext {
    /// Unauthenticated context for a brand taken from the route.
    pub fn for_route(brand_id: BrandId) -> Self {
        Self {
            brand_id,
            authenticated: false,
        }
    }

    pub fn brand_id(&self) -> BrandId {
        self.brand_id
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Create a record stamped with this context's brand.
    pub fn create<D: BrandScopedDraft>(&self, draft: D) -> D::Record {
        draft.into_record(self.brand_id)
    }

    /// Create a record from caller JSON. Any `brandId` in the payload is ignored.
    pub fn create_from_json<D: BrandScopedDraft>(
        &self,
        payload: serde_json::Value,
    ) -> Result<D::Record, BrandError> {
        let draft: D = serde_json::from_value(payload).map_err(|e| BrandError::InvalidPayload {
            reason: e.to_string(),
        })?;
        Ok(self.create(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BrandRegistry {
        BrandRegistry::new(vec![
            Brand::new(BrandId::Root, "root-key"),
            Brand::new(BrandId::Abc, "abc-key"),
            Brand::new(BrandId::Cbc, "cbc-key"),
        ])
        .expect("valid registry")
    }

    #[test]
    fn test_parse_is_exact() {
        assert_eq!(BrandId::parse("root"), Some(BrandId::Root));
        assert_eq!(BrandId::parse("Root"), None);
        assert_eq!(BrandId::parse("ROOT"), None);
        assert_eq!(BrandId::parse(" root"), None);
        assert_eq!(BrandId::parse("root' OR '1'='1"), None);
        assert_eq!(BrandId::parse(""), None);
    }

    #[test]
    fn test_serde_uses_lowercase_ids() {
        let json = serde_json::to_string(&BrandId::Cbl).expect("serialize");
        assert_eq!(json, "\"cbl\"");
        assert!(serde_json::from_str::<BrandId>("\"CBL\"").is_err());
    }

    #[test]
    fn test_admin_key_valid_only_for_own_brand() {
        let registry = registry();
        assert!(registry.is_admin_key_valid("abc", Some("abc-key")));
        assert!(!registry.is_admin_key_valid("cbc", Some("abc-key")));
        assert!(!registry.is_admin_key_valid("abc", Some("")));
        assert!(!registry.is_admin_key_valid("abc", None));
        assert!(!registry.is_admin_key_valid("ABC", Some("abc-key")));
        assert!(!registry.is_admin_key_valid("cbl", Some("abc-key")));
    }

    #[test]
    fn test_registry_rejects_shared_key() {
        let err = BrandRegistry::new(vec![
            Brand::new(BrandId::Abc, "same"),
            Brand::new(BrandId::Cbc, "same"),
        ])
        .expect_err("shared key must fail");
        assert!(matches!(err, ConfigError::DuplicateAdminKey { .. }));
    }

    #[test]
    fn test_registry_rejects_duplicate_brand_and_empty_key() {
        let err = BrandRegistry::new(vec![
            Brand::new(BrandId::Abc, "k1"),
            Brand::new(BrandId::Abc, "k2"),
        ])
        .expect_err("duplicate brand must fail");
        assert!(matches!(err, ConfigError::DuplicateBrand { .. }));

        let err = BrandRegistry::new(vec![Brand::new(BrandId::Abc, "")])
            .expect_err("empty key must fail");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_authorize_paths() {
        let registry = registry();

        let ctx = registry
            .authorize("abc", Some("abc-key"))
            .expect("own key authorizes");
        assert_eq!(ctx.brand_id(), BrandId::Abc);
        assert!(ctx.is_authenticated());

        let err = registry
            .authorize("abc", Some("cbc-key"))
            .expect_err("foreign key must be rejected");
        assert!(matches!(err, BrandError::BrandMismatch { .. }));
        assert_eq!(err.code(), crate::ErrorCode::BadInput);

        let err = registry
            .authorize("abc", Some("nope"))
            .expect_err("unknown key");
        assert_eq!(err.code(), crate::ErrorCode::Unauthorized);

        let err = registry.authorize("abc", None).expect_err("missing key");
        assert_eq!(err.code(), crate::ErrorCode::Unauthorized);

        let err = registry
            .authorize("Abc", Some("abc-key"))
            .expect_err("case variant brand");
        assert!(matches!(err, BrandError::UnknownBrand { .. }));
    }

    #[test]
    fn test_admin_key_debug_is_redacted() {
        let brand = Brand::new(BrandId::Root, "super-secret");
        let printed = format!("{:?}", brand);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn test_from_config_rejects_unknown_brand() {
        let entries = vec![BrandConfig {
            id: "acme".to_string(),
            admin_key: "k".to_string(),
        }];
        let err = BrandRegistry::from_config(&entries).expect_err("unknown brand");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
