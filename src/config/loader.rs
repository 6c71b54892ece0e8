//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{Environment, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Optional path to a TOML file with the base configuration.
pub const CONFIG_PATH_VAR: &str = "GATEWAY_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config = read_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the base file named by `GATEWAY_CONFIG` (if any), apply environment
/// overrides, then validate.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = match std::env::var(CONFIG_PATH_VAR) {
        Ok(path) => read_file(Path::new(&path))?,
        Err(_) => GatewayConfig::default(),
    };

    apply_env(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` abstracts the environment so tests do not mutate process state.
pub fn apply_env<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("PORT") {
        config.listener.port = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var: "PORT", value: raw })?;
    }

    if let Some(raw) = lookup("GATEWAY_ENV") {
        config.environment =
            Environment::parse(&raw).ok_or(ConfigError::Env { var: "GATEWAY_ENV", value: raw })?;
    }

    if let Some(raw) = lookup("ALLOWED_ORIGINS") {
        config.security.allowed_origins = raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(issuer) = lookup("JWT_ISSUER") {
        config.auth.jwt_issuer = Some(issuer);
    }
    if let Some(audience) = lookup("JWT_AUDIENCE") {
        config.auth.jwt_audience = Some(audience);
    }

    if let Some(raw) = lookup("DRAIN_TIMEOUT_SECS") {
        config.shutdown.drain_timeout_secs = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var: "DRAIN_TIMEOUT_SECS", value: raw })?;
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(address) = lookup("METRICS_ADDRESS") {
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = address;
    }

    Ok(())
}
