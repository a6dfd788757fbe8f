//! Configuration management for tagchat
//!
//! This module provides environment-based configuration management with
//! support for defaults, TOML files and validation.

use crate::core_admin::{AdminConfig, TrustModel};
use crate::core_channel::ChannelConfig;
use crate::core_gateway::GatewayConfig;
use crate::core_store::{DiscoveryConfig, DiscoveryMode};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Admin resolution
    pub admin: AdminConfig,

    /// Mutation gateway
    pub gateway: GatewayConfig,

    /// In-memory discovery behaviour
    pub discovery: DiscoveryConfig,

    /// Channel state derivation
    pub channel: ChannelConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", key, e)))
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: TAGCHAT_<SECTION>_<KEY>
    /// Example: TAGCHAT_ADMIN_TRUST_MODEL=provenance
    ///
    /// `TAGCHAT_ORIGIN` picks the trust model from the deployment origin;
    /// an explicit `TAGCHAT_ADMIN_TRUST_MODEL` takes precedence.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Logging config
        if let Some(level) = lookup("TAGCHAT_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = lookup("TAGCHAT_LOG_JSON") {
            config.logging.json_format = parse_var("TAGCHAT_LOG_JSON", &json)?;
        }

        // Admin config
        if let Some(origin) = lookup("TAGCHAT_ORIGIN") {
            config.admin.trust_model = TrustModel::from_origin(&origin);
        }
        if let Some(model) = lookup("TAGCHAT_ADMIN_TRUST_MODEL") {
            config.admin.trust_model = TrustModel::from_str(&model)
                .ok_or_else(|| ConfigError::InvalidValue(format!("Unknown trust model: {}", model)))?;
        }
        if let Some(timeout) = lookup("TAGCHAT_ADMIN_RESOLUTION_TIMEOUT") {
            let parsed: Duration = humantime_serde::re::humantime::parse_duration(&timeout)
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid resolution timeout: {}", e)))?;
            config.admin.resolution_timeout = Some(parsed);
        }

        // Gateway config
        if let Some(flag) = lookup("TAGCHAT_GATEWAY_FORBID_SELF_ADD") {
            config.gateway.forbid_self_add = parse_var("TAGCHAT_GATEWAY_FORBID_SELF_ADD", &flag)?;
        }

        // Discovery config
        if let Some(mode) = lookup("TAGCHAT_DISCOVERY_MODE") {
            config.discovery.mode = DiscoveryMode::from_str(&mode)
                .ok_or_else(|| ConfigError::InvalidValue(format!("Unknown discovery mode: {}", mode)))?;
        }
        if let Some(buffer) = lookup("TAGCHAT_DISCOVERY_LIVE_BUFFER") {
            config.discovery.live_buffer = parse_var("TAGCHAT_DISCOVERY_LIVE_BUFFER", &buffer)?;
        }

        // Channel config
        if let Some(flag) = lookup("TAGCHAT_CHANNEL_TRUSTED_NAMES") {
            config.channel.trusted_names = parse_var("TAGCHAT_CHANNEL_TRUSTED_NAMES", &flag)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        if self.admin.resolution_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ValidationFailed(
                "resolution_timeout must be greater than 0".to_string(),
            ));
        }

        if self.discovery.live_buffer == 0 {
            return Err(ConfigError::ValidationFailed(
                "live_buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.admin.trust_model, TrustModel::Direct);
        assert!(config.gateway.forbid_self_add);
        assert_eq!(config.discovery.mode, DiscoveryMode::Snapshot);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.discovery.live_buffer = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.admin.resolution_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_origin_selects_trust_model() {
        let config = Config::from_lookup(lookup(&[("TAGCHAT_ORIGIN", "https://provenance.chat.example")])).unwrap();
        assert_eq!(config.admin.trust_model, TrustModel::Provenance);

        let config = Config::from_lookup(lookup(&[
            ("TAGCHAT_ORIGIN", "https://provenance.chat.example"),
            ("TAGCHAT_ADMIN_TRUST_MODEL", "direct"),
        ]))
        .unwrap();
        assert_eq!(config.admin.trust_model, TrustModel::Direct);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("TAGCHAT_LOG_LEVEL", "debug"),
            ("TAGCHAT_ADMIN_RESOLUTION_TIMEOUT", "2s"),
            ("TAGCHAT_GATEWAY_FORBID_SELF_ADD", "false"),
            ("TAGCHAT_DISCOVERY_MODE", "live"),
            ("TAGCHAT_CHANNEL_TRUSTED_NAMES", "true"),
        ]))
        .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.admin.resolution_timeout, Some(Duration::from_secs(2)));
        assert!(!config.gateway.forbid_self_add);
        assert_eq!(config.discovery.mode, DiscoveryMode::Live);
        assert!(config.channel.trusted_names);
    }

    #[test]
    fn test_invalid_env_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("TAGCHAT_ADMIN_TRUST_MODEL", "parallax")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("TAGCHAT_LOG_JSON", "maybe")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("TAGCHAT_DISCOVERY_LIVE_BUFFER", "0")])),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagchat.toml");

        let mut config = Config::default();
        config.admin.trust_model = TrustModel::Provenance;
        config.admin.resolution_timeout = Some(Duration::from_millis(1500));
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.admin.trust_model, TrustModel::Provenance);
        assert_eq!(loaded.admin.resolution_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[admin]\ntrust_model = \"provenance\"\n").unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.admin.trust_model, TrustModel::Provenance);
        assert_eq!(loaded.admin.resolution_timeout, None);
        assert_eq!(loaded.logging.level, "info");
    }
}
