//! Identifier and record types for temporary voice channels

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create an identifier from its raw value
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the raw value
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

snowflake_id!(
    /// Unique identifier for a guild (community server)
    GuildId
);

snowflake_id!(
    /// Unique identifier for a channel or category
    ChannelId
);

snowflake_id!(
    /// Unique identifier for a user
    UserId
);

snowflake_id!(
    /// Unique identifier for a sent message
    MessageId
);

impl UserId {
    /// Render the user as a platform mention (`<@id>`)
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

/// A guild member as seen by an event or command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    pub display_name: String,
}

impl Member {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Ownership record for one live temporary channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempChannelRecord {
    pub channel_id: ChannelId,
    pub owner_id: UserId,
}

/// Lifecycle state of a temporary channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Owner reserved, platform channel being created
    Provisioning,
    /// Channel exists and is owned
    Active,
    /// Channel observed empty, waiting out the grace period
    PendingDeletion,
    /// Channel deleted and its record removed
    Deleted,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Provisioning => "provisioning",
            ChannelState::Active => "active",
            ChannelState::PendingDeletion => "pending_deletion",
            ChannelState::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Render the temporary channel name from a template containing `{name}`
pub fn render_channel_name(template: &str, display_name: &str) -> String {
    template.replace("{name}", display_name)
}
