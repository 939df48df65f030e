//! Configuration management for TempVC
//!
//! This module provides file and environment based configuration with
//! defaults and validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persistent state locations
    pub storage: StorageConfig,

    /// Names used when provisioning channels
    pub channels: ChannelConfig,

    /// Temporary channel lifecycle timing
    pub lifecycle: LifecycleConfig,

    /// Owner control session settings
    pub session: SessionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding per-guild settings
    pub guild_config_path: PathBuf,
}

/// Channel naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Category that holds the creator channel and all temporary channels
    pub category_name: String,

    /// Voice channel whose join event triggers creation
    pub creator_channel_name: String,

    /// Temporary channel name; `{name}` is replaced by the owner's display name
    pub name_template: String,
}

/// Lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long a channel must stay empty before it is deleted
    #[serde(with = "humantime_serde")]
    pub empty_channel_grace: Duration,
}

/// Control session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Send owners a control panel after creation
    pub enabled: bool,

    /// Inactivity timeout while waiting for a choice
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// How long to wait for a user-limit reply
    #[serde(with = "humantime_serde")]
    pub limit_prompt_timeout: Duration,

    /// Highest user limit the platform accepts
    pub max_user_limit: u32,
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

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            guild_config_path: PathBuf::from("config.json"),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            category_name: "Temporary Channels".to_string(),
            creator_channel_name: "➕ Create VC".to_string(),
            name_template: "{name}'s Channel".to_string(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            empty_channel_grace: Duration::from_secs(5),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(600),
            limit_prompt_timeout: Duration::from_secs(30),
            max_user_limit: 99,
        }
    }
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

fn invalid_env(var: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidEnv {
        var,
        reason: reason.to_string(),
    }
}

fn parse_duration(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime_serde::re::humantime::parse_duration(value)
        .map_err(|e| invalid_env(var, e))
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: TEMPVC_<SECTION>_<KEY>
    /// Example: TEMPVC_SESSION_TIMEOUT=10m
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `TEMPVC_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Storage config
        if let Ok(path) = env::var("TEMPVC_STORAGE_GUILD_CONFIG_PATH") {
            self.storage.guild_config_path = PathBuf::from(path);
        }

        // Channel config
        if let Ok(name) = env::var("TEMPVC_CHANNELS_CATEGORY_NAME") {
            self.channels.category_name = name;
        }
        if let Ok(name) = env::var("TEMPVC_CHANNELS_CREATOR_CHANNEL_NAME") {
            self.channels.creator_channel_name = name;
        }
        if let Ok(template) = env::var("TEMPVC_CHANNELS_NAME_TEMPLATE") {
            self.channels.name_template = template;
        }

        // Lifecycle config
        if let Ok(grace) = env::var("TEMPVC_LIFECYCLE_EMPTY_CHANNEL_GRACE") {
            self.lifecycle.empty_channel_grace =
                parse_duration("TEMPVC_LIFECYCLE_EMPTY_CHANNEL_GRACE", &grace)?;
        }

        // Session config
        if let Ok(enabled) = env::var("TEMPVC_SESSION_ENABLED") {
            self.session.enabled = enabled
                .parse()
                .map_err(|e| invalid_env("TEMPVC_SESSION_ENABLED", e))?;
        }
        if let Ok(timeout) = env::var("TEMPVC_SESSION_TIMEOUT") {
            self.session.timeout = parse_duration("TEMPVC_SESSION_TIMEOUT", &timeout)?;
        }
        if let Ok(timeout) = env::var("TEMPVC_SESSION_LIMIT_PROMPT_TIMEOUT") {
            self.session.limit_prompt_timeout =
                parse_duration("TEMPVC_SESSION_LIMIT_PROMPT_TIMEOUT", &timeout)?;
        }
        if let Ok(max) = env::var("TEMPVC_SESSION_MAX_USER_LIMIT") {
            self.session.max_user_limit = max
                .parse()
                .map_err(|e| invalid_env("TEMPVC_SESSION_MAX_USER_LIMIT", e))?;
        }

        // Logging config
        if let Ok(level) = env::var("TEMPVC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = env::var("TEMPVC_LOG_JSON") {
            self.logging.json_format = json
                .parse()
                .map_err(|e| invalid_env("TEMPVC_LOG_JSON", e))?;
        }

        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.guild_config_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "guild_config_path must not be empty".to_string(),
            ));
        }

        if self.channels.category_name.trim().is_empty()
            || self.channels.creator_channel_name.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "category and creator channel names must not be empty".to_string(),
            ));
        }

        if !self.channels.name_template.contains("{name}") {
            return Err(ConfigError::Invalid(format!(
                "name_template must contain {{name}}: {}",
                self.channels.name_template
            )));
        }

        if self.lifecycle.empty_channel_grace.is_zero() {
            return Err(ConfigError::Invalid(
                "empty_channel_grace must be greater than 0".to_string(),
            ));
        }

        if self.session.timeout.is_zero() || self.session.limit_prompt_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "session timeouts must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lifecycle.empty_channel_grace, Duration::from_secs(5));
        assert_eq!(config.session.timeout, Duration::from_secs(600));
        assert_eq!(config.session.limit_prompt_timeout, Duration::from_secs(30));
        assert_eq!(config.channels.category_name, "Temporary Channels");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.channels.name_template = "channel".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.lifecycle.empty_channel_grace = Duration::ZERO;
        assert!(config.validate().is_err());

        config = Config::default();
        config.session.limit_prompt_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        config = Config::default();
        config.channels.creator_channel_name = "  ".to_string();
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
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [lifecycle]
            empty_channel_grace = "10s"

            [session]
            timeout = "5m"
            "#,
        )
        .unwrap();

        assert_eq!(config.lifecycle.empty_channel_grace, Duration::from_secs(10));
        assert_eq!(config.session.timeout, Duration::from_secs(300));
        assert_eq!(config.session.limit_prompt_timeout, Duration::from_secs(30));
        assert!(config.session.enabled);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tempvc.toml");

        let mut config = Config::default();
        config.session.max_user_limit = 25;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.session.max_user_limit, 25);
        assert_eq!(loaded.session.timeout, config.session.timeout);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = Config::from_file(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Read { ref path, .. } if *path == missing));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[session\ntimeout = ").unwrap();
        let err = Config::from_file(&broken).unwrap_err();
        assert!(matches!(err, ConfigError::Settings { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }
}
