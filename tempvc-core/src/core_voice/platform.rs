//! Platform capability traits
//!
//! The chat platform is reached only through these two traits, which keeps
//! the lifecycle logic independent of any client library:
//!
//! ```text
//! ChannelLifecycle / ControlSession / Commands
//!       |
//!       v
//! GuildDirectory + DirectMessages (traits)
//!       |
//!       +---> InMemoryPlatform (tests, offline simulation)
//!       |
//!       +---> a live gateway client adapter
//! ```

use super::errors::PlatformResult;
use super::types::{ChannelId, GuildId, MessageId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Who a permission overwrite applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionTarget {
    /// The guild's default (`@everyone`) role
    DefaultRole,
    /// A single member
    Member(UserId),
    /// The bot's own member
    Bot,
}

/// Tri-state permission overwrite: `None` leaves the permission inherited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub connect: Option<bool>,
    pub manage_channels: Option<bool>,
    pub manage_roles: Option<bool>,
    pub move_members: Option<bool>,
}

impl PermissionOverwrite {
    pub fn allow_connect() -> Self {
        Self {
            connect: Some(true),
            ..Default::default()
        }
    }

    pub fn deny_connect() -> Self {
        Self {
            connect: Some(false),
            ..Default::default()
        }
    }

    /// Rights the bot needs on the temporary channel category
    pub fn bot_management() -> Self {
        Self {
            connect: None,
            manage_channels: Some(true),
            manage_roles: Some(true),
            move_members: Some(true),
        }
    }

    /// Combine with a newer overwrite; explicit values in `newer` win
    pub fn merged(self, newer: PermissionOverwrite) -> Self {
        Self {
            connect: newer.connect.or(self.connect),
            manage_channels: newer.manage_channels.or(self.manage_channels),
            manage_roles: newer.manage_roles.or(self.manage_roles),
            move_members: newer.move_members.or(self.move_members),
        }
    }
}

/// Snapshot of a voice channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceChannel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub parent_id: Option<ChannelId>,
    /// `0` means unlimited
    pub user_limit: u32,
    pub members: Vec<UserId>,
}

impl VoiceChannel {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }
}

/// Options offered on an owner's control panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlChoice {
    Public,
    Private,
    SetLimit,
}

impl ControlChoice {
    pub const ALL: [ControlChoice; 3] = [
        ControlChoice::Public,
        ControlChoice::Private,
        ControlChoice::SetLimit,
    ];

    /// Reaction emoji representing the choice
    pub fn emoji(&self) -> &'static str {
        match self {
            ControlChoice::Public => "📢",
            ControlChoice::Private => "🔒",
            ControlChoice::SetLimit => "🔢",
        }
    }

    pub fn from_emoji(emoji: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.emoji() == emoji)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ControlChoice::Public => "Public",
            ControlChoice::Private => "Private",
            ControlChoice::SetLimit => "Set Limit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ControlChoice::Public => "Let anyone join",
            ControlChoice::Private => "Make it invite-only",
            ControlChoice::SetLimit => "Set a user limit",
        }
    }
}

impl fmt::Display for ControlChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}

/// Structured prompt listing the control choices for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPanel {
    pub title: String,
    pub choices: Vec<ControlChoice>,
}

impl ControlPanel {
    pub fn for_channel(channel_name: &str) -> Self {
        Self {
            title: format!("Channel Controls for `{}`", channel_name),
            choices: ControlChoice::ALL.to_vec(),
        }
    }
}

/// Handle to an open private conversation with one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DmChannel {
    pub id: ChannelId,
    pub user_id: UserId,
}

/// Guild-side operations on categories, channels, permissions and voice state
#[async_trait]
pub trait GuildDirectory: Send + Sync {
    /// Owner of the guild (implicitly bypasses channel overwrites)
    async fn guild_owner(&self, guild_id: GuildId) -> PlatformResult<UserId>;

    async fn find_category(&self, guild_id: GuildId, name: &str)
        -> PlatformResult<Option<ChannelId>>;

    async fn create_category(
        &self,
        guild_id: GuildId,
        name: &str,
        bot_overwrite: PermissionOverwrite,
    ) -> PlatformResult<ChannelId>;

    /// Find a voice channel by name among the children of `category_id`
    async fn find_voice_channel(
        &self,
        guild_id: GuildId,
        category_id: ChannelId,
        name: &str,
    ) -> PlatformResult<Option<ChannelId>>;

    async fn create_voice_channel(
        &self,
        guild_id: GuildId,
        category_id: ChannelId,
        name: &str,
    ) -> PlatformResult<VoiceChannel>;

    /// Whether a category or channel with this id currently exists
    async fn channel_exists(&self, guild_id: GuildId, channel_id: ChannelId)
        -> PlatformResult<bool>;

    /// Look up a voice channel; `None` when it no longer exists
    async fn voice_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlatformResult<Option<VoiceChannel>>;

    async fn set_permission(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        target: PermissionTarget,
        overwrite: PermissionOverwrite,
    ) -> PlatformResult<()>;

    async fn delete_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        reason: &str,
    ) -> PlatformResult<()>;

    /// Set the channel's user cap; `0` removes the cap
    async fn set_user_limit(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        limit: u32,
    ) -> PlatformResult<()>;

    /// Move a member to `channel_id`, or disconnect them when `None`
    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: Option<ChannelId>,
    ) -> PlatformResult<()>;

    async fn member_voice_channel(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> PlatformResult<Option<ChannelId>>;
}

/// Private conversation operations used by control sessions
#[async_trait]
pub trait DirectMessages: Send + Sync {
    async fn open_dm(&self, user_id: UserId) -> PlatformResult<DmChannel>;

    async fn send_message(&self, dm: &DmChannel, content: &str) -> PlatformResult<MessageId>;

    async fn send_control_panel(
        &self,
        dm: &DmChannel,
        panel: &ControlPanel,
    ) -> PlatformResult<MessageId>;

    /// Wait for the DM's user to pick a choice on `panel_id`
    ///
    /// Returns `Ok(None)` when `timeout` elapses first.
    async fn await_choice(
        &self,
        dm: &DmChannel,
        panel_id: MessageId,
        timeout: Duration,
    ) -> PlatformResult<Option<ControlChoice>>;

    /// Wait for the next text reply from the DM's user
    ///
    /// Returns `Ok(None)` when `timeout` elapses first.
    async fn await_reply(&self, dm: &DmChannel, timeout: Duration)
        -> PlatformResult<Option<String>>;

    /// Remove the user's reaction so the same choice can be picked again
    async fn clear_choice(
        &self,
        dm: &DmChannel,
        panel_id: MessageId,
        choice: ControlChoice,
    ) -> PlatformResult<()>;

    /// Replace the panel with `notice` and stop offering its choices
    async fn expire_control_panel(
        &self,
        dm: &DmChannel,
        panel_id: MessageId,
        notice: &str,
    ) -> PlatformResult<()>;
}
