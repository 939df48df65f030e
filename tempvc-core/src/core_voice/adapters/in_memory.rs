//! In-memory chat platform
//!
//! Implements [`GuildDirectory`] and [`DirectMessages`] over plain maps so the
//! lifecycle can be exercised without a gateway connection. Used by the test
//! suite and by the CLI's offline simulator. Driver methods (`connect`,
//! `react`, `reply`, ...) play the part of human users.

use crate::core_voice::errors::{PlatformError, PlatformResult};
use crate::core_voice::events::VoiceStateUpdate;
use crate::core_voice::platform::{
    ControlChoice, ControlPanel, DirectMessages, DmChannel, GuildDirectory, PermissionOverwrite,
    PermissionTarget, VoiceChannel,
};
use crate::core_voice::types::{ChannelId, GuildId, Member, MessageId, UserId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// Highest user limit the simulated platform accepts
pub const PLATFORM_MAX_USER_LIMIT: u32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Category,
    Voice,
}

/// Full view of a simulated channel, including its permission overwrites
#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
    pub user_limit: u32,
    pub overwrites: HashMap<PermissionTarget, PermissionOverwrite>,
}

impl ChannelSnapshot {
    pub fn overwrite(&self, target: PermissionTarget) -> Option<PermissionOverwrite> {
        self.overwrites.get(&target).copied()
    }

    /// Explicit connect setting for `target`, if any
    pub fn connect_for(&self, target: PermissionTarget) -> Option<bool> {
        self.overwrite(target).and_then(|o| o.connect)
    }
}

/// A message the bot sent into a DM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmMessage {
    pub id: MessageId,
    pub content: String,
    pub panel: bool,
    pub expired: bool,
}

#[derive(Debug)]
struct GuildEntry {
    owner: UserId,
    members: HashMap<UserId, String>,
    voice: HashMap<UserId, ChannelId>,
    bot_can_manage: bool,
}

#[derive(Debug)]
struct DmState {
    channel_id: ChannelId,
    messages: Vec<DmMessage>,
    cleared: Vec<(MessageId, ControlChoice)>,
}

#[derive(Debug, Default)]
struct PlatformState {
    next_id: u64,
    guilds: HashMap<GuildId, GuildEntry>,
    channels: BTreeMap<ChannelId, ChannelSnapshot>,
    dms: HashMap<UserId, DmState>,
    blocked_dms: HashSet<UserId>,
    deleted: Vec<ChannelId>,
    voice_updates: Vec<VoiceStateUpdate>,
}

impl PlatformState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn guild(&self, guild_id: GuildId) -> PlatformResult<&GuildEntry> {
        self.guilds
            .get(&guild_id)
            .ok_or_else(|| PlatformError::NotFound(format!("guild {}", guild_id)))
    }

    fn guild_mut(&mut self, guild_id: GuildId) -> PlatformResult<&mut GuildEntry> {
        self.guilds
            .get_mut(&guild_id)
            .ok_or_else(|| PlatformError::NotFound(format!("guild {}", guild_id)))
    }

    fn require_manage(&self, guild_id: GuildId, action: &str) -> PlatformResult<()> {
        if self.guild(guild_id)?.bot_can_manage {
            Ok(())
        } else {
            Err(PlatformError::Forbidden(format!("missing permissions to {}", action)))
        }
    }

    fn channel_in(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<&ChannelSnapshot> {
        self.channels
            .get(&channel_id)
            .filter(|c| c.guild_id == guild_id)
    }

    fn voice_channel(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<VoiceChannel> {
        let channel = self
            .channel_in(guild_id, channel_id)
            .filter(|c| c.kind == ChannelKind::Voice)?;
        let mut members: Vec<UserId> = self
            .guilds
            .get(&guild_id)
            .map(|g| {
                g.voice
                    .iter()
                    .filter(|(_, ch)| **ch == channel_id)
                    .map(|(user, _)| *user)
                    .collect()
            })
            .unwrap_or_default();
        members.sort();

        Some(VoiceChannel {
            id: channel.id,
            guild_id,
            name: channel.name.clone(),
            parent_id: channel.parent_id,
            user_limit: channel.user_limit,
            members,
        })
    }

    fn member(&self, guild_id: GuildId, user_id: UserId) -> Member {
        let name = self
            .guilds
            .get(&guild_id)
            .and_then(|g| g.members.get(&user_id).cloned())
            .unwrap_or_else(|| format!("user-{}", user_id));
        Member::new(user_id, name)
    }

    /// Point `user_id`'s voice connection at `target` and describe the change
    fn set_voice(
        &mut self,
        guild_id: GuildId,
        user_id: UserId,
        target: Option<ChannelId>,
    ) -> PlatformResult<VoiceStateUpdate> {
        let member = self.member(guild_id, user_id);
        let guild = self.guild_mut(guild_id)?;
        let before = match target {
            Some(channel_id) => guild.voice.insert(user_id, channel_id),
            None => guild.voice.remove(&user_id),
        };

        Ok(VoiceStateUpdate {
            guild_id,
            member,
            before,
            after: target,
        })
    }

    fn dm_mut(&mut self, user_id: UserId) -> PlatformResult<&mut DmState> {
        self.dms
            .get_mut(&user_id)
            .ok_or_else(|| PlatformError::NotFound(format!("dm with {}", user_id)))
    }
}

/// Input from one user, handed only to a wait that is open when it arrives
#[derive(Default)]
struct Inbox {
    choice: Mutex<Option<oneshot::Sender<(MessageId, ControlChoice)>>>,
    reply: Mutex<Option<oneshot::Sender<String>>>,
}

fn take_waiter<T>(slot: &Mutex<Option<oneshot::Sender<T>>>) -> Option<oneshot::Sender<T>> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
        .filter(|tx| !tx.is_closed())
}

fn open_wait<T>(slot: &Mutex<Option<oneshot::Sender<T>>>) -> oneshot::Receiver<T> {
    let (tx, rx) = oneshot::channel();
    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tx);
    rx
}

fn is_waiting<T>(slot: &Mutex<Option<oneshot::Sender<T>>>) -> bool {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .as_ref()
        .is_some_and(|tx| !tx.is_closed())
}

/// Simulated guilds, channels, voice connections and DMs
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
    inboxes: Mutex<HashMap<UserId, Arc<Inbox>>>,
    activity: watch::Sender<u64>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        let (activity, _) = watch::channel(0);
        Self {
            state: Mutex::new(PlatformState {
                next_id: 1000,
                ..Default::default()
            }),
            inboxes: Mutex::new(HashMap::new()),
            activity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn touch(&self) {
        self.activity.send_modify(|n| *n = n.wrapping_add(1));
    }

    fn inbox(&self, user_id: UserId) -> Arc<Inbox> {
        let mut inboxes = self
            .inboxes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            inboxes
                .entry(user_id)
                .or_insert_with(|| Arc::new(Inbox::default())),
        )
    }

    // --- world setup ---

    pub fn add_guild(&self, guild_id: GuildId, owner: Member) {
        let mut state = self.lock();
        let mut members = HashMap::new();
        members.insert(owner.id, owner.display_name);
        state.guilds.insert(
            guild_id,
            GuildEntry {
                owner: owner.id,
                members,
                voice: HashMap::new(),
                bot_can_manage: true,
            },
        );
    }

    pub fn add_member(&self, guild_id: GuildId, member: Member) -> PlatformResult<()> {
        let mut state = self.lock();
        state
            .guild_mut(guild_id)?
            .members
            .insert(member.id, member.display_name);
        Ok(())
    }

    pub fn member(&self, guild_id: GuildId, user_id: UserId) -> Member {
        self.lock().member(guild_id, user_id)
    }

    /// Grant or revoke the bot's channel management rights in a guild
    pub fn set_bot_can_manage(&self, guild_id: GuildId, allowed: bool) -> PlatformResult<()> {
        self.lock().guild_mut(guild_id)?.bot_can_manage = allowed;
        Ok(())
    }

    /// Make `open_dm` fail for this user
    pub fn block_dms(&self, user_id: UserId) {
        self.lock().blocked_dms.insert(user_id);
    }

    /// Create a plain voice channel outside the bot's control
    pub fn add_voice_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        parent_id: Option<ChannelId>,
    ) -> PlatformResult<ChannelId> {
        let mut state = self.lock();
        state.guild(guild_id)?;
        let id = ChannelId::new(state.next_id());
        state.channels.insert(
            id,
            ChannelSnapshot {
                id,
                guild_id,
                name: name.to_string(),
                kind: ChannelKind::Voice,
                parent_id,
                user_limit: 0,
                overwrites: HashMap::new(),
            },
        );
        Ok(id)
    }

    // --- user actions ---

    /// Connect (or move) a user to a voice channel
    pub fn connect(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
    ) -> PlatformResult<VoiceStateUpdate> {
        let update = {
            let mut state = self.lock();
            if state.voice_channel(guild_id, channel_id).is_none() {
                return Err(PlatformError::NotFound(format!("voice channel {}", channel_id)));
            }
            state.set_voice(guild_id, user_id, Some(channel_id))?
        };
        self.touch();
        Ok(update)
    }

    pub fn disconnect(&self, guild_id: GuildId, user_id: UserId) -> PlatformResult<VoiceStateUpdate> {
        let update = self.lock().set_voice(guild_id, user_id, None)?;
        self.touch();
        Ok(update)
    }

    /// Delete a channel as an admin would, bypassing the bot
    pub fn delete_channel_externally(&self, channel_id: ChannelId) -> Vec<VoiceStateUpdate> {
        let updates = {
            let mut state = self.lock();
            let Some(channel) = state.channels.remove(&channel_id) else {
                return Vec::new();
            };
            state.deleted.push(channel_id);
            Self::evict_members(&mut state, channel.guild_id, channel_id)
        };
        self.touch();
        updates
    }

    fn evict_members(
        state: &mut PlatformState,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Vec<VoiceStateUpdate> {
        let connected: Vec<UserId> = state
            .guilds
            .get(&guild_id)
            .map(|g| {
                g.voice
                    .iter()
                    .filter(|(_, ch)| **ch == channel_id)
                    .map(|(user, _)| *user)
                    .collect()
            })
            .unwrap_or_default();

        connected
            .into_iter()
            .filter_map(|user| state.set_voice(guild_id, user, None).ok())
            .collect()
    }

    /// Pick `choice` on the user's newest live control panel
    ///
    /// Returns false when the user has no live panel, or when nothing is
    /// waiting for a choice right now. Such a reaction is dropped.
    pub fn react(&self, user_id: UserId, choice: ControlChoice) -> bool {
        let panel_id = {
            let state = self.lock();
            state.dms.get(&user_id).and_then(|dm| {
                dm.messages
                    .iter()
                    .rev()
                    .find(|m| m.panel && !m.expired)
                    .map(|m| m.id)
            })
        };

        match panel_id {
            Some(panel_id) => match take_waiter(&self.inbox(user_id).choice) {
                Some(tx) => tx.send((panel_id, choice)).is_ok(),
                None => false,
            },
            None => false,
        }
    }

    /// Send a text message from the user into their DM with the bot
    ///
    /// Returns false when no reply was being awaited; the text is dropped.
    pub fn reply(&self, user_id: UserId, text: impl Into<String>) -> bool {
        match take_waiter(&self.inbox(user_id).reply) {
            Some(tx) => tx.send(text.into()).is_ok(),
            None => false,
        }
    }

    /// The bot is currently waiting for a choice from `user_id`
    pub fn awaiting_choice(&self, user_id: UserId) -> bool {
        is_waiting(&self.inbox(user_id).choice)
    }

    /// The bot is currently waiting for a text reply from `user_id`
    pub fn awaiting_reply(&self, user_id: UserId) -> bool {
        is_waiting(&self.inbox(user_id).reply)
    }

    // --- inspection ---

    pub fn channel(&self, channel_id: ChannelId) -> Option<ChannelSnapshot> {
        self.lock().channels.get(&channel_id).cloned()
    }

    pub fn channel_by_name(&self, guild_id: GuildId, name: &str) -> Option<ChannelSnapshot> {
        self.lock()
            .channels
            .values()
            .find(|c| c.guild_id == guild_id && c.name == name)
            .cloned()
    }

    pub fn channels(&self, guild_id: GuildId) -> Vec<ChannelSnapshot> {
        self.lock()
            .channels
            .values()
            .filter(|c| c.guild_id == guild_id)
            .cloned()
            .collect()
    }

    pub fn voice_members(&self, guild_id: GuildId, channel_id: ChannelId) -> Vec<UserId> {
        self.lock()
            .voice_channel(guild_id, channel_id)
            .map(|c| c.members)
            .unwrap_or_default()
    }

    pub fn voice_channel_of(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.lock()
            .guilds
            .get(&guild_id)
            .and_then(|g| g.voice.get(&user_id).copied())
    }

    pub fn deleted_channels(&self) -> Vec<ChannelId> {
        self.lock().deleted.clone()
    }

    pub fn dm_messages(&self, user_id: UserId) -> Vec<DmMessage> {
        self.lock()
            .dms
            .get(&user_id)
            .map(|dm| dm.messages.clone())
            .unwrap_or_default()
    }

    pub fn dm_texts(&self, user_id: UserId) -> Vec<String> {
        self.dm_messages(user_id)
            .into_iter()
            .map(|m| m.content)
            .collect()
    }

    pub fn cleared_choices(&self, user_id: UserId) -> Vec<ControlChoice> {
        self.lock()
            .dms
            .get(&user_id)
            .map(|dm| dm.cleared.iter().map(|(_, c)| *c).collect())
            .unwrap_or_default()
    }

    /// Voice changes caused by bot actions (moves, kicks, deletions)
    pub fn take_voice_updates(&self) -> Vec<VoiceStateUpdate> {
        std::mem::take(&mut self.lock().voice_updates)
    }

    /// Wait until `check` holds, re-evaluating after every platform change
    pub async fn wait_until(&self, mut check: impl FnMut(&Self) -> bool) {
        let mut rx = self.activity.subscribe();
        loop {
            if check(self) {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait until the bot has sent `user_id` a DM containing `needle`
    pub async fn wait_for_dm(&self, user_id: UserId, needle: &str) {
        self.wait_until(|p| p.dm_texts(user_id).iter().any(|t| t.contains(needle)))
            .await;
    }

    /// Number of DMs sent to `user_id` whose text contains `needle`
    pub fn dm_count(&self, user_id: UserId, needle: &str) -> usize {
        self.dm_texts(user_id)
            .iter()
            .filter(|t| t.contains(needle))
            .count()
    }

    fn push_dm(&self, dm: &DmChannel, content: String, panel: bool) -> PlatformResult<MessageId> {
        let id = {
            let mut state = self.lock();
            let id = MessageId::new(state.next_id());
            state.dm_mut(dm.user_id)?.messages.push(DmMessage {
                id,
                content,
                panel,
                expired: false,
            });
            id
        };
        self.touch();
        Ok(id)
    }
}

#[async_trait]
impl GuildDirectory for InMemoryPlatform {
    async fn guild_owner(&self, guild_id: GuildId) -> PlatformResult<UserId> {
        Ok(self.lock().guild(guild_id)?.owner)
    }

    async fn find_category(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> PlatformResult<Option<ChannelId>> {
        let state = self.lock();
        state.guild(guild_id)?;
        Ok(state
            .channels
            .values()
            .find(|c| c.guild_id == guild_id && c.kind == ChannelKind::Category && c.name == name)
            .map(|c| c.id))
    }

    async fn create_category(
        &self,
        guild_id: GuildId,
        name: &str,
        bot_overwrite: PermissionOverwrite,
    ) -> PlatformResult<ChannelId> {
        let id = {
            let mut state = self.lock();
            state.require_manage(guild_id, "create categories")?;
            let id = ChannelId::new(state.next_id());
            let mut overwrites = HashMap::new();
            overwrites.insert(PermissionTarget::Bot, bot_overwrite);
            state.channels.insert(
                id,
                ChannelSnapshot {
                    id,
                    guild_id,
                    name: name.to_string(),
                    kind: ChannelKind::Category,
                    parent_id: None,
                    user_limit: 0,
                    overwrites,
                },
            );
            id
        };
        self.touch();
        Ok(id)
    }

    async fn find_voice_channel(
        &self,
        guild_id: GuildId,
        category_id: ChannelId,
        name: &str,
    ) -> PlatformResult<Option<ChannelId>> {
        let state = self.lock();
        state.guild(guild_id)?;
        Ok(state
            .channels
            .values()
            .find(|c| {
                c.guild_id == guild_id
                    && c.kind == ChannelKind::Voice
                    && c.parent_id == Some(category_id)
                    && c.name == name
            })
            .map(|c| c.id))
    }

    async fn create_voice_channel(
        &self,
        guild_id: GuildId,
        category_id: ChannelId,
        name: &str,
    ) -> PlatformResult<VoiceChannel> {
        let channel = {
            let mut state = self.lock();
            state.require_manage(guild_id, "create channels")?;
            let is_category = state
                .channel_in(guild_id, category_id)
                .map(|c| c.kind == ChannelKind::Category)
                .unwrap_or(false);
            if !is_category {
                return Err(PlatformError::NotFound(format!("category {}", category_id)));
            }

            let id = ChannelId::new(state.next_id());
            state.channels.insert(
                id,
                ChannelSnapshot {
                    id,
                    guild_id,
                    name: name.to_string(),
                    kind: ChannelKind::Voice,
                    parent_id: Some(category_id),
                    user_limit: 0,
                    overwrites: HashMap::new(),
                },
            );
            state
                .voice_channel(guild_id, id)
                .ok_or_else(|| PlatformError::Unavailable("channel vanished".to_string()))?
        };
        self.touch();
        Ok(channel)
    }

    async fn channel_exists(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlatformResult<bool> {
        Ok(self.lock().channel_in(guild_id, channel_id).is_some())
    }

    async fn voice_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlatformResult<Option<VoiceChannel>> {
        Ok(self.lock().voice_channel(guild_id, channel_id))
    }

    async fn set_permission(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        target: PermissionTarget,
        overwrite: PermissionOverwrite,
    ) -> PlatformResult<()> {
        {
            let mut state = self.lock();
            state.require_manage(guild_id, "manage permissions")?;
            let channel = state
                .channels
                .get_mut(&channel_id)
                .filter(|c| c.guild_id == guild_id)
                .ok_or_else(|| PlatformError::NotFound(format!("channel {}", channel_id)))?;
            let current = channel.overwrites.get(&target).copied().unwrap_or_default();
            channel.overwrites.insert(target, current.merged(overwrite));
        }
        self.touch();
        Ok(())
    }

    async fn delete_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        _reason: &str,
    ) -> PlatformResult<()> {
        {
            let mut state = self.lock();
            state.require_manage(guild_id, "delete channels")?;
            if state.channel_in(guild_id, channel_id).is_none() {
                return Err(PlatformError::NotFound(format!("channel {}", channel_id)));
            }
            state.channels.remove(&channel_id);
            state.deleted.push(channel_id);
            let updates = Self::evict_members(&mut state, guild_id, channel_id);
            state.voice_updates.extend(updates);
        }
        self.touch();
        Ok(())
    }

    async fn set_user_limit(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        limit: u32,
    ) -> PlatformResult<()> {
        if limit > PLATFORM_MAX_USER_LIMIT {
            return Err(PlatformError::Unavailable(format!(
                "user_limit must be at most {}",
                PLATFORM_MAX_USER_LIMIT
            )));
        }
        {
            let mut state = self.lock();
            state.require_manage(guild_id, "edit channels")?;
            let channel = state
                .channels
                .get_mut(&channel_id)
                .filter(|c| c.guild_id == guild_id && c.kind == ChannelKind::Voice)
                .ok_or_else(|| PlatformError::NotFound(format!("voice channel {}", channel_id)))?;
            channel.user_limit = limit;
        }
        self.touch();
        Ok(())
    }

    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: Option<ChannelId>,
    ) -> PlatformResult<()> {
        {
            let mut state = self.lock();
            state.require_manage(guild_id, "move members")?;
            if !state.guild(guild_id)?.voice.contains_key(&user_id) {
                return Err(PlatformError::NotFound(format!(
                    "member {} is not connected to voice",
                    user_id
                )));
            }
            if let Some(target) = channel_id {
                if state.voice_channel(guild_id, target).is_none() {
                    return Err(PlatformError::NotFound(format!("voice channel {}", target)));
                }
            }
            let update = state.set_voice(guild_id, user_id, channel_id)?;
            state.voice_updates.push(update);
        }
        self.touch();
        Ok(())
    }

    async fn member_voice_channel(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> PlatformResult<Option<ChannelId>> {
        Ok(self.lock().guild(guild_id)?.voice.get(&user_id).copied())
    }
}

#[async_trait]
impl DirectMessages for InMemoryPlatform {
    async fn open_dm(&self, user_id: UserId) -> PlatformResult<DmChannel> {
        let mut state = self.lock();
        if state.blocked_dms.contains(&user_id) {
            return Err(PlatformError::Forbidden(format!(
                "cannot send messages to {}",
                user_id
            )));
        }
        if let Some(dm) = state.dms.get(&user_id) {
            return Ok(DmChannel {
                id: dm.channel_id,
                user_id,
            });
        }

        let channel_id = ChannelId::new(state.next_id());
        state.dms.insert(
            user_id,
            DmState {
                channel_id,
                messages: Vec::new(),
                cleared: Vec::new(),
            },
        );
        Ok(DmChannel {
            id: channel_id,
            user_id,
        })
    }

    async fn send_message(&self, dm: &DmChannel, content: &str) -> PlatformResult<MessageId> {
        self.push_dm(dm, content.to_string(), false)
    }

    async fn send_control_panel(
        &self,
        dm: &DmChannel,
        panel: &ControlPanel,
    ) -> PlatformResult<MessageId> {
        let mut content = panel.title.clone();
        for choice in &panel.choices {
            content.push_str(&format!("\n{} — {}", choice, choice.description()));
        }
        self.push_dm(dm, content, true)
    }

    async fn await_choice(
        &self,
        dm: &DmChannel,
        panel_id: MessageId,
        timeout: Duration,
    ) -> PlatformResult<Option<ControlChoice>> {
        let inbox = self.inbox(dm.user_id);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let rx = open_wait(&inbox.choice);
            match tokio::time::timeout_at(deadline, rx).await {
                Err(_) => return Ok(None),
                Ok(Err(_)) => {
                    return Err(PlatformError::Unavailable(
                        "choice wait replaced by another".to_string(),
                    ))
                }
                Ok(Ok((id, choice))) if id == panel_id => return Ok(Some(choice)),
                // reactions on other panels are not for this wait
                Ok(Ok(_)) => continue,
            }
        }
    }

    async fn await_reply(
        &self,
        dm: &DmChannel,
        timeout: Duration,
    ) -> PlatformResult<Option<String>> {
        let rx = open_wait(&self.inbox(dm.user_id).reply);

        match tokio::time::timeout(timeout, rx).await {
            Err(_) => Ok(None),
            Ok(Err(_)) => Err(PlatformError::Unavailable(
                "reply wait replaced by another".to_string(),
            )),
            Ok(Ok(text)) => Ok(Some(text)),
        }
    }

    async fn clear_choice(
        &self,
        dm: &DmChannel,
        panel_id: MessageId,
        choice: ControlChoice,
    ) -> PlatformResult<()> {
        self.lock().dm_mut(dm.user_id)?.cleared.push((panel_id, choice));
        self.touch();
        Ok(())
    }

    async fn expire_control_panel(
        &self,
        dm: &DmChannel,
        panel_id: MessageId,
        notice: &str,
    ) -> PlatformResult<()> {
        {
            let mut state = self.lock();
            let message = state
                .dm_mut(dm.user_id)?
                .messages
                .iter_mut()
                .find(|m| m.id == panel_id)
                .ok_or_else(|| PlatformError::NotFound(format!("message {}", panel_id)))?;
            message.content = notice.to_string();
            message.expired = true;
        }
        self.touch();
        Ok(())
    }
}
