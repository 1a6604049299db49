//! Error types for the client.

use evkit_core::{ErrorCode, EvkitError, Failure};
use evkit_storage::LmdbStoreError;

use crate::config::ConfigLoadError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Cache store error: {0}")]
    Store(#[from] LmdbStoreError),
    #[error("Telemetry error: {0}")]
    Telemetry(String),
    #[error(transparent)]
    Core(#[from] EvkitError),
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Core(e) => e.code(),
            _ => ErrorCode::Internal,
        }
    }
}

impl From<ClientError> for Failure {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Core(e) => e.into(),
            other => Failure::internal(other.to_string()),
        }
    }
}

impl From<evkit_core::ConfigError> for ClientError {
    fn from(err: evkit_core::ConfigError) -> Self {
        ClientError::Config(ConfigLoadError::Invalid(err))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use evkit_core::BrandError;

    #[test]
    fn test_codes() {
        let brand = ClientError::Core(EvkitError::Brand(BrandError::InvalidAdminKey {
            brand: "abc".to_string(),
        }));
        assert_eq!(brand.code(), ErrorCode::Unauthorized);
        let failure = Failure::from(brand);
        assert_eq!(failure.code, ErrorCode::Unauthorized);

        let telemetry = ClientError::Telemetry("already set".to_string());
        assert_eq!(telemetry.code(), ErrorCode::Internal);
        assert_eq!(Failure::from(telemetry).message, "Telemetry error: already set");
    }
}
