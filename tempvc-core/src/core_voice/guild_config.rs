//! Durable per-guild settings
//!
//! The backing file is a flat JSON object keyed by guild id:
//!
//! ```json
//! {
//!     "123456789": { "category_id": 42, "creator_channel_id": 43 }
//! }
//! ```
//!
//! A malformed entry only makes that guild "not configured"; it is dropped
//! the next time the file is rewritten.

use super::errors::{TempVcError, TempVcResult};
use super::types::{ChannelId, GuildId};
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Settings written by `setup` for one guild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub category_id: ChannelId,
    pub creator_channel_id: ChannelId,
}

/// JSON-file backed store of [`GuildConfig`] records
#[derive(Debug)]
pub struct GuildConfigStore {
    /// `None` keeps the store in memory only
    path: Option<PathBuf>,
    guilds: RwLock<HashMap<GuildId, GuildConfig>>,
}

impl GuildConfigStore {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            guilds: RwLock::new(HashMap::new()),
        }
    }

    /// Load the store from `path`; a missing file yields an empty store
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let guilds = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse_guilds(&contents).map_err(|source| ConfigError::GuildFile {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No guild config file yet, starting empty");
                HashMap::new()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        info!(path = %path.display(), guilds = guilds.len(), "Loaded guild configs");
        Ok(Self {
            path: Some(path),
            guilds: RwLock::new(guilds),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get(&self, guild_id: GuildId) -> Option<GuildConfig> {
        self.guilds.read().await.get(&guild_id).copied()
    }

    /// Config for `guild_id`, or [`TempVcError::NotConfigured`]
    pub async fn require(&self, guild_id: GuildId) -> TempVcResult<GuildConfig> {
        self.get(guild_id).await.ok_or(TempVcError::NotConfigured)
    }

    /// Overwrite the guild's config and persist the whole file
    pub async fn set(&self, guild_id: GuildId, config: GuildConfig) -> Result<(), ConfigError> {
        let mut guilds = self.guilds.write().await;
        let previous = guilds.insert(guild_id, config);

        // Persist while still holding the write lock so concurrent setups
        // cannot interleave their file writes
        if let Err(e) = self.persist(&guilds).await {
            match previous {
                Some(old) => guilds.insert(guild_id, old),
                None => guilds.remove(&guild_id),
            };
            return Err(e);
        }

        debug!(guild_id = %guild_id, "Saved guild config");
        Ok(())
    }

    pub async fn guilds(&self) -> Vec<(GuildId, GuildConfig)> {
        let guilds = self.guilds.read().await;
        let mut entries: Vec<_> = guilds.iter().map(|(id, cfg)| (*id, *cfg)).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    async fn persist(&self, guilds: &HashMap<GuildId, GuildConfig>) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let keyed: std::collections::BTreeMap<String, &GuildConfig> = guilds
            .iter()
            .map(|(id, cfg)| (id.to_string(), cfg))
            .collect();
        let contents = serde_json::to_string_pretty(&keyed)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|source| ConfigError::Write {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|source| ConfigError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(())
    }
}

fn parse_guilds(contents: &str) -> Result<HashMap<GuildId, GuildConfig>, serde_json::Error> {
    if contents.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let raw: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(contents)?;

    let mut guilds = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let Ok(guild_id) = key.parse::<u64>() else {
            warn!(key = %key, "Skipping guild config with non-numeric id");
            continue;
        };
        match serde_json::from_value::<GuildConfig>(value) {
            Ok(config) => {
                guilds.insert(GuildId::new(guild_id), config);
            }
            Err(e) => {
                warn!(guild_id = guild_id, error = %e, "Skipping malformed guild config");
            }
        }
    }
    Ok(guilds)
}
