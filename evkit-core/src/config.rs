//! Configuration types shared across crates.

use serde::Deserialize;
use std::fmt;

/// One brand entry in configuration.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrandConfig {
    pub id: String,
    pub admin_key: String,
}

impl fmt::Debug for BrandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrandConfig")
            .field("id", &self.id)
            .field("admin_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_config_debug_redacts_key() {
        let config = BrandConfig {
            id: "abc".to_string(),
            admin_key: "hunter2".to_string(),
        };
        let printed = format!("{:?}", config);
        assert!(printed.contains("abc"));
        assert!(!printed.contains("hunter2"));
    }
}
