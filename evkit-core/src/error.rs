//! Error types for evkit operations.
//!
//! Every error maps to exactly one [`ErrorCode`] and converts into a
//! [`Failure`], which is how the dispatcher turns errors into envelopes.

use crate::envelope::{ErrorCode, Failure};
use thiserror::Error;

/// Transport layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("{transport} not available - page must be served from host")]
    Unavailable { transport: String },

    #[error("{message}")]
    Failure { message: String },

    #[error("Remote method not found: {method}")]
    MissingMethod { method: String },

    #[error("Unknown method: {method}")]
    UnknownRoute { method: String },

    #[error("Transport panicked while calling {method}: {message}")]
    Panicked { method: String, message: String },

    #[error("Malformed envelope from {method}: {reason}")]
    MalformedEnvelope { method: String, reason: String },
}

/// Persistent store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store backend failed: {reason}")]
    Backend { reason: String },

    #[error("Serialization failed for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate brand in configuration: {brand}")]
    DuplicateBrand { brand: String },

    #[error("Admin key for {brand} is shared with {other}")]
    DuplicateAdminKey { brand: String, other: String },
}

/// Brand isolation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrandError {
    #[error("Unknown brand: {raw}")]
    UnknownBrand { raw: String },

    #[error("Admin key required for brand {brand}")]
    MissingAdminKey { brand: String },

    #[error("Invalid admin key for brand {brand}")]
    InvalidAdminKey { brand: String },

    #[error("Brand mismatch: request targets '{requested}' but admin key belongs to '{key_brand}'")]
    BrandMismatch { requested: String, key_brand: String },

    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String },
}

impl BrandError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BrandError::UnknownBrand { .. }
            | BrandError::BrandMismatch { .. }
            | BrandError::InvalidPayload { .. } => ErrorCode::BadInput,
            BrandError::MissingAdminKey { .. } | BrandError::InvalidAdminKey { .. } => {
                ErrorCode::Unauthorized
            }
        }
    }
}

/// Master error type for all evkit errors.
#[derive(Debug, Clone, Error)]
pub enum EvkitError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Brand error: {0}")]
    Brand(#[from] BrandError),
}

impl EvkitError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EvkitError::Brand(e) => e.code(),
            EvkitError::Transport(_) | EvkitError::Store(_) | EvkitError::Config(_) => {
                ErrorCode::Internal
            }
        }
    }
}

impl From<TransportError> for Failure {
    fn from(err: TransportError) -> Self {
        Failure::internal(err.to_string())
    }
}

impl From<BrandError> for Failure {
    fn from(err: BrandError) -> Self {
        Failure::new(err.code(), err.to_string())
    }
}

impl From<EvkitError> for Failure {
    fn from(err: EvkitError) -> Self {
        match err {
            EvkitError::Transport(e) => e.into(),
            EvkitError::Brand(e) => e.into(),
            other => Failure::new(other.code(), other.to_string()),
        }
    }
}

/// Result type alias for evkit operations.
pub type EvkitResult<T> = Result<T, EvkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message_names_transport() {
        let err = TransportError::Unavailable {
            transport: "host.run".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "host.run not available - page must be served from host"
        );
    }

    #[test]
    fn test_transport_failure_keeps_message_verbatim() {
        let failure: Failure = TransportError::Failure {
            message: "Quota exceeded".to_string(),
        }
        .into();
        assert_eq!(failure.code, ErrorCode::Internal);
        assert_eq!(failure.message, "Quota exceeded");
    }

    #[test]
    fn test_brand_error_codes() {
        let mismatch = BrandError::BrandMismatch {
            requested: "abc".to_string(),
            key_brand: "cbc".to_string(),
        };
        assert_eq!(mismatch.code(), ErrorCode::BadInput);
        assert!(mismatch.to_string().contains("'abc'"));
        assert!(mismatch.to_string().contains("'cbc'"));

        let invalid = BrandError::InvalidAdminKey {
            brand: "root".to_string(),
        };
        assert_eq!(invalid.code(), ErrorCode::Unauthorized);

        let unknown = BrandError::UnknownBrand {
            raw: "ROOT".to_string(),
        };
        assert_eq!(unknown.code(), ErrorCode::BadInput);
    }

    #[test]
    fn test_evkit_error_into_failure() {
        let err = EvkitError::from(StoreError::LockPoisoned);
        assert_eq!(err.code(), ErrorCode::Internal);
        let failure = Failure::from(err);
        assert_eq!(failure.code, ErrorCode::Internal);
        assert!(failure.message.contains("lock poisoned"));

        let brand = EvkitError::from(BrandError::MissingAdminKey {
            brand: "abc".to_string(),
        });
        let failure = Failure::from(brand);
        assert_eq!(failure.code, ErrorCode::Unauthorized);
        assert_eq!(failure.message, "Admin key required for brand abc");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::DuplicateAdminKey {
            brand: "cbc".to_string(),
            other: "abc".to_string(),
        };
        assert!(err.to_string().contains("cbc"));
        assert!(err.to_string().contains("abc"));
    }
}
