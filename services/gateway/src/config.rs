//! services/gateway/src/config.rs
//!
//! Defines the gateway's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup and then
//! passed by reference into the credential verifier and the upstream client.
//! The `.env` file is used for local development.

use axum::http::HeaderValue;
use reqwest::Url;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_BRAIN_API_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_PLAN_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REVIEW_TIMEOUT_MS: u64 = 15_000;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub auth_enabled: bool,
    /// Present whenever `auth_enabled` is true.
    pub jwt_secret: Option<String>,
    pub brain_api_url: Url,
    pub plan_timeout: Duration,
    pub review_timeout: Duration,
    pub cors_origin: Option<HeaderValue>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let mut bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;
        if let Some(port) = lookup("PORT") {
            let port = port.trim().parse::<u16>().map_err(|e| {
                ConfigError::InvalidValue("PORT".to_string(), e.to_string())
            })?;
            bind_address.set_port(port);
        }

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Authentication ---
        let auth_enabled = match lookup("AUTH_ENABLED") {
            None => true,
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "AUTH_ENABLED".to_string(),
                    format!("'{}' is not a boolean", raw),
                )
            })?,
        };
        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.trim().is_empty());
        if auth_enabled && jwt_secret.is_none() {
            return Err(ConfigError::MissingVar("JWT_SECRET".to_string()));
        }

        // --- Upstream Knowledge Engine ---
        let brain_api_url_str =
            lookup("BRAIN_API_URL").unwrap_or_else(|| DEFAULT_BRAIN_API_URL.to_string());
        let brain_api_url = Url::parse(&brain_api_url_str).map_err(|e| {
            ConfigError::InvalidValue("BRAIN_API_URL".to_string(), e.to_string())
        })?;
        if brain_api_url.cannot_be_a_base() || !brain_api_url.scheme().starts_with("http") {
            return Err(ConfigError::InvalidValue(
                "BRAIN_API_URL".to_string(),
                format!("'{}' is not an http(s) base URL", brain_api_url_str),
            ));
        }

        let plan_timeout = timeout_var(&lookup, "PLAN_TIMEOUT_MS", DEFAULT_PLAN_TIMEOUT_MS)?;
        let review_timeout =
            timeout_var(&lookup, "REVIEW_TIMEOUT_MS", DEFAULT_REVIEW_TIMEOUT_MS)?;

        // --- CORS ---
        let cors_origin = lookup("CORS_ORIGIN")
            .filter(|s| !s.trim().is_empty() && s.trim() != "*")
            .map(|origin| {
                HeaderValue::from_str(origin.trim()).map_err(|e| {
                    ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            bind_address,
            log_level,
            auth_enabled,
            jwt_secret,
            brain_api_url,
            plan_timeout,
            review_timeout,
            cors_origin,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn timeout_var<F>(lookup: &F, name: &str, default_ms: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(Duration::from_millis(default_ms));
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a positive number of milliseconds", raw),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let config = load(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS.parse().unwrap());
        assert!(config.auth_enabled);
        assert_eq!(config.brain_api_url.as_str(), DEFAULT_BRAIN_API_URL);
        assert_eq!(config.plan_timeout, Duration::from_secs(5));
        assert_eq!(config.review_timeout, Duration::from_secs(15));
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn secret_is_required_while_auth_is_enabled() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingVar(var)) if var == "JWT_SECRET"
        ));
        let config = load(&[("AUTH_ENABLED", "false")]).unwrap();
        assert!(!config.auth_enabled);
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn port_overrides_the_bind_address_port() {
        let config = load(&[
            ("JWT_SECRET", "s"),
            ("BIND_ADDRESS", "127.0.0.1:3000"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn invalid_values_are_reported_by_name() {
        for (name, value) in [
            ("BRAIN_API_URL", "not a url"),
            ("BRAIN_API_URL", "mailto:brain@example.com"),
            ("PLAN_TIMEOUT_MS", "0"),
            ("REVIEW_TIMEOUT_MS", "soon"),
            ("AUTH_ENABLED", "maybe"),
            ("PORT", "70000"),
        ] {
            let err = load(&[("JWT_SECRET", "s"), (name, value)]).unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue(var, _) if var == name),
                "{name}={value} gave {err}"
            );
        }
    }
}
