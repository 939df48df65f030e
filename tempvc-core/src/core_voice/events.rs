//! Inbound platform events

use super::types::{ChannelId, GuildId, Member};
use serde::{Deserialize, Serialize};

/// A member's voice connection changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    pub guild_id: GuildId,
    pub member: Member,
    /// Channel the member was in before the change
    pub before: Option<ChannelId>,
    /// Channel the member is in after the change
    pub after: Option<ChannelId>,
}

impl VoiceStateUpdate {
    /// Channel the member left, if the change took them out of one
    pub fn left_channel(&self) -> Option<ChannelId> {
        match (self.before, self.after) {
            (Some(before), Some(after)) if before == after => None,
            (before, _) => before,
        }
    }

    /// Channel the member entered, if the change put them into one
    pub fn joined_channel(&self) -> Option<ChannelId> {
        match (self.before, self.after) {
            (Some(before), Some(after)) if before == after => None,
            (_, after) => after,
        }
    }
}
