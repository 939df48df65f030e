//! Errors for application config and the guild config file

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The TOML settings file did not parse
    #[error("Invalid settings file {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Cannot encode settings: {0}")]
    EncodeSettings(#[from] toml::ser::Error),

    /// The guild config file is not a JSON object keyed by guild id
    #[error("Guild config file {} is unreadable: {source}", .path.display())]
    GuildFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Cannot encode guild configs: {0}")]
    EncodeGuilds(#[from] serde_json::Error),

    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
