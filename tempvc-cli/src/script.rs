//! Simulation scripts
//!
//! A script is JSON Lines: one step object per line, tagged by `step`.
//! Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! {"step": "guild", "id": 100, "owner": 1}
//! {"step": "member", "guild": 100, "id": 2, "name": "Alice"}
//! {"step": "command", "guild": 100, "user": 1, "manage_channels": true, "command": {"name": "setup"}}
//! {"step": "join", "guild": 100, "user": 2, "channel": "➕ Create VC"}
//! {"step": "wait", "duration": "6s"}
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tempvc_core::core_voice::{Command, ControlChoice};

fn default_owner_name() -> String {
    "Owner".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Create a guild owned by user `owner`
    Guild {
        id: u64,
        owner: u64,
        #[serde(default = "default_owner_name")]
        owner_name: String,
    },
    Member {
        guild: u64,
        id: u64,
        name: String,
    },
    Command {
        guild: u64,
        user: u64,
        #[serde(default)]
        manage_channels: bool,
        command: Command,
    },
    /// Connect to a voice channel, looked up by name
    Join {
        guild: u64,
        user: u64,
        channel: String,
    },
    Leave {
        guild: u64,
        user: u64,
    },
    React {
        user: u64,
        choice: ControlChoice,
    },
    Reply {
        user: u64,
        text: String,
    },
    Wait {
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
    /// Delete a channel as a guild admin would
    DeleteChannel {
        guild: u64,
        channel: String,
    },
    BlockDms {
        user: u64,
    },
    /// Grant or revoke the bot's channel management rights
    BotPermissions {
        guild: u64,
        manage: bool,
    },
}

/// A parsed simulation script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    /// Steps paired with their 1-based source line
    pub steps: Vec<(usize, Step)>,
}

impl Script {
    pub fn parse(text: &str) -> Result<Self> {
        let mut steps = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step: Step = serde_json::from_str(line)
                .with_context(|| format!("invalid step on line {}", index + 1))?;
            steps.push((index + 1, step));
        }
        Ok(Self { steps })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
