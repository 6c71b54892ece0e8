//! Configuration validation.
//!
//! Semantic checks run once at startup, after serde has handled syntax and
//! environment overrides have been applied. All problems are reported at once.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, DEV_JWT_SECRET};

/// Minimum HS256 secret length accepted in production.
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("allowed origin {0:?} is not a canonical http(s) origin")]
    InvalidOrigin(String),

    #[error("rate limit `{0}` must be greater than zero")]
    ZeroRateLimit(&'static str),

    #[error("rate limit window must be greater than zero")]
    ZeroWindow,

    #[error("max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("jwt_secret must be set")]
    MissingJwtSecret,

    #[error("jwt_secret must be at least 32 bytes and not the development default in production")]
    WeakJwtSecret,

    #[error("api key #{0} has an empty key or subject")]
    IncompleteApiKey(usize),

    #[error("api key for subject {0:?} grants no capabilities")]
    ApiKeyWithoutCapabilities(String),

    #[error("api key #{0} duplicates an earlier key")]
    DuplicateApiKey(usize),

    #[error("drain timeout must be greater than zero")]
    ZeroDrainTimeout,

    #[error("metrics address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a fully assembled configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for origin in &config.security.allowed_origins {
        if !is_canonical_origin(origin) {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    if config.security.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let limits = &config.rate_limit;
    if limits.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if limits.production_limit == 0 {
        errors.push(ValidationError::ZeroRateLimit("production_limit"));
    }
    if limits.development_limit == 0 {
        errors.push(ValidationError::ZeroRateLimit("development_limit"));
    }

    let secret = &config.auth.jwt_secret;
    if secret.is_empty() {
        errors.push(ValidationError::MissingJwtSecret);
    } else if config.environment.is_production()
        && (secret.len() < MIN_PRODUCTION_SECRET_LEN || secret == DEV_JWT_SECRET)
    {
        errors.push(ValidationError::WeakJwtSecret);
    }

    let mut seen = HashSet::new();
    for (index, key) in config.auth.api_keys.iter().enumerate() {
        if key.key.is_empty() || key.subject.is_empty() {
            errors.push(ValidationError::IncompleteApiKey(index));
        }
        if key.capabilities.iter().all(|c| c.trim().is_empty()) {
            errors.push(ValidationError::ApiKeyWithoutCapabilities(key.subject.clone()));
        }
        if !seen.insert(key.key.as_str()) {
            errors.push(ValidationError::DuplicateApiKey(index));
        }
    }

    if config.shutdown.drain_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDrainTimeout);
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An origin is canonical when it round-trips through URL origin serialization,
/// e.g. `https://app.example.com` but not `https://app.example.com/` or `*`.
fn is_canonical_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.origin().ascii_serialization() == origin
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ApiKeyConfig, Environment};

    fn api_key(key: &str, subject: &str, caps: &[&str]) -> ApiKeyConfig {
        ApiKeyConfig {
            key: key.into(),
            subject: subject.into(),
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
            active: true,
            revoked: false,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn rejects_non_canonical_origins() {
        let mut config = GatewayConfig::default();
        config.security.allowed_origins = vec![
            "https://app.example.com".into(),
            "https://app.example.com/".into(),
            "*".into(),
            "ftp://files.example.com".into(),
        ];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::InvalidOrigin("*".into())));
    }

    #[test]
    fn production_requires_strong_secret() {
        let mut config = GatewayConfig::default();
        config.environment = Environment::Production;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::WeakJwtSecret]);

        config.auth.jwt_secret = "x".repeat(48);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn reports_every_api_key_problem() {
        let mut config = GatewayConfig::default();
        config.auth.api_keys = vec![
            api_key("key-1", "svc-a", &["payments:read"]),
            api_key("key-1", "svc-b", &["payroll:read"]),
            api_key("key-3", "", &[]),
        ];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateApiKey(1)));
        assert!(errors.contains(&ValidationError::IncompleteApiKey(2)));
        assert!(errors.contains(&ValidationError::ApiKeyWithoutCapabilities(String::new())));
    }

    #[test]
    fn rejects_zero_limits() {
        let mut config = GatewayConfig::default();
        config.rate_limit.window_secs = 0;
        config.rate_limit.production_limit = 0;
        config.shutdown.drain_timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
