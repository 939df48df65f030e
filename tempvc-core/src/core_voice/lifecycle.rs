//! Temporary channel lifecycle
//!
//! ```text
//! Provisioning ──▶ Active ──(empty)──▶ PendingDeletion ──(grace)──▶ Deleted
//!                    ▲                        │
//!                    └──────(rejoin)──────────┘
//! ```
//!
//! Creation reserves the owner before touching the platform so two
//! concurrent triggers for one member cannot both provision a channel.
//! Deletion is debounced: an empty channel gets a cancellable delayed task,
//! keyed by channel id and stamped with a ticket so a superseded task never
//! acts on a newer schedule.

use super::errors::{PlatformError, TempVcError, TempVcResult};
use super::guild_config::GuildConfigStore;
use super::platform::{GuildDirectory, PermissionOverwrite, PermissionTarget};
use super::registry::OwnershipRegistry;
use super::session::SessionTable;
use super::types::{render_channel_name, ChannelId, ChannelState, GuildId, Member, TempChannelRecord, UserId};
use crate::config::ChannelConfig;
use crate::telemetry::{
    self, CHANNELS_ACTIVE, CHANNELS_CREATED, CHANNELS_DELETED, CREATIONS_REJECTED,
    DELETIONS_ABORTED,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// Audit-log reason attached to idle deletions
pub const DELETE_REASON: &str = "Temporary channel empty";

const CREATE_FORBIDDEN: &str = "I lack permissions to create channels in the designated category.";

/// What asked for a channel to be created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationTrigger {
    /// The `createvc` command
    Command,
    /// The member joined the guild's creator channel
    AutoJoin { creator_channel_id: ChannelId },
}

#[derive(Debug, Clone)]
pub struct CreationRequest {
    pub guild_id: GuildId,
    pub member: Member,
    pub trigger: CreationTrigger,
    /// Report failures back to the member instead of only logging them
    pub notify: bool,
}

impl CreationRequest {
    pub fn command(guild_id: GuildId, member: Member) -> Self {
        Self {
            guild_id,
            member,
            trigger: CreationTrigger::Command,
            notify: true,
        }
    }

    pub fn auto_join(guild_id: GuildId, member: Member, creator_channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            member,
            trigger: CreationTrigger::AutoJoin { creator_channel_id },
            notify: false,
        }
    }
}

/// A successfully provisioned temporary channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedChannel {
    pub record: TempChannelRecord,
    pub name: String,
    /// The owner was moved into the new channel
    pub moved: bool,
    pub session_started: bool,
}

impl CreatedChannel {
    /// Confirmation shown to the member who ran `createvc`
    pub fn confirmation(&self) -> String {
        format!("Created channel `{}`! Check your DMs for options.", self.name)
    }
}

struct PendingDeletion {
    ticket: u64,
    handle: JoinHandle<()>,
}

/// Creates temporary channels and deletes them once they stay empty
pub struct ChannelLifecycle {
    directory: Arc<dyn GuildDirectory>,
    registry: Arc<OwnershipRegistry>,
    guild_configs: Arc<GuildConfigStore>,
    sessions: SessionTable,
    channels: ChannelConfig,
    grace: Duration,
    pending: Mutex<HashMap<ChannelId, PendingDeletion>>,
    next_ticket: AtomicU64,
}

impl ChannelLifecycle {
    pub fn new(
        directory: Arc<dyn GuildDirectory>,
        registry: Arc<OwnershipRegistry>,
        guild_configs: Arc<GuildConfigStore>,
        sessions: SessionTable,
        channels: ChannelConfig,
        grace: Duration,
    ) -> Self {
        Self {
            directory,
            registry,
            guild_configs,
            sessions,
            channels,
            grace,
            pending: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn directory(&self) -> &Arc<dyn GuildDirectory> {
        &self.directory
    }

    pub fn registry(&self) -> &Arc<OwnershipRegistry> {
        &self.registry
    }

    pub fn guild_configs(&self) -> &Arc<GuildConfigStore> {
        &self.guild_configs
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn channel_config(&self) -> &ChannelConfig {
        &self.channels
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<ChannelId, PendingDeletion>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Provision a temporary channel for the requesting member
    pub async fn create(&self, request: CreationRequest) -> TempVcResult<CreatedChannel> {
        let result = self.provision(&request).await;

        match &result {
            Ok(created) => {
                telemetry::record_counter(CHANNELS_CREATED, 1);
                telemetry::record_gauge(CHANNELS_ACTIVE, self.registry.len() as f64);
                info!(
                    guild_id = %request.guild_id,
                    channel_id = %created.record.channel_id,
                    owner_id = %created.record.owner_id,
                    trigger = ?request.trigger,
                    "Temporary channel created"
                );
            }
            Err(e) => {
                telemetry::record_counter(CREATIONS_REJECTED, 1);
                if request.notify {
                    info!(
                        guild_id = %request.guild_id,
                        owner_id = %request.member.id,
                        error = %e,
                        "Channel creation rejected"
                    );
                } else {
                    debug!(
                        guild_id = %request.guild_id,
                        owner_id = %request.member.id,
                        error = %e,
                        "Ignoring failed auto-join creation"
                    );
                }
            }
        }

        result
    }

    async fn provision(&self, request: &CreationRequest) -> TempVcResult<CreatedChannel> {
        let guild_id = request.guild_id;
        let member = &request.member;

        // Held until commit; dropping it on any early return frees the owner again
        let reservation = self.registry.reserve(member.id)?;

        let config = self.guild_configs.require(guild_id).await?;
        if !self
            .directory
            .channel_exists(guild_id, config.category_id)
            .await?
        {
            return Err(TempVcError::MissingResource(format!(
                "category {}",
                config.category_id
            )));
        }

        let name = render_channel_name(&self.channels.name_template, &member.display_name);
        let channel = match self
            .directory
            .create_voice_channel(guild_id, config.category_id, &name)
            .await
        {
            Ok(channel) => channel,
            Err(PlatformError::Forbidden(reason)) => {
                debug!(guild_id = %guild_id, reason = %reason, "Channel creation forbidden");
                return Err(TempVcError::PermissionDenied(CREATE_FORBIDDEN.to_string()));
            }
            Err(PlatformError::NotFound(what)) => return Err(TempVcError::MissingResource(what)),
            Err(e) => return Err(e.into()),
        };

        let record = match reservation.commit(channel.id) {
            Ok(record) => record,
            Err(e) => {
                self.discard(guild_id, channel.id).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.restrict_access(guild_id, channel.id, member.id).await {
            warn!(channel_id = %channel.id, error = %e, "Rolling back channel with incomplete permissions");
            self.registry.remove(&channel.id);
            self.discard(guild_id, channel.id).await;
            return Err(e);
        }

        let moved = self.move_owner(guild_id, member.id, channel.id).await;
        let session_started = self
            .sessions
            .start(guild_id, channel.id, &name, member.id);

        Ok(CreatedChannel {
            record,
            name,
            moved,
            session_started,
        })
    }

    /// Private by default; the owner gets an explicit connect grant
    async fn restrict_access(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        owner_id: UserId,
    ) -> TempVcResult<()> {
        self.directory
            .set_permission(
                guild_id,
                channel_id,
                PermissionTarget::DefaultRole,
                PermissionOverwrite::deny_connect(),
            )
            .await?;

        // The guild owner bypasses overwrites anyway
        if self.directory.guild_owner(guild_id).await? != owner_id {
            self.directory
                .set_permission(
                    guild_id,
                    channel_id,
                    PermissionTarget::Member(owner_id),
                    PermissionOverwrite::allow_connect(),
                )
                .await?;
        }
        Ok(())
    }

    async fn move_owner(&self, guild_id: GuildId, owner_id: UserId, channel_id: ChannelId) -> bool {
        match self.directory.member_voice_channel(guild_id, owner_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(e) => {
                warn!(owner_id = %owner_id, error = %e, "Could not resolve owner's voice state");
                return false;
            }
        }

        match self
            .directory
            .move_member(guild_id, owner_id, Some(channel_id))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(owner_id = %owner_id, channel_id = %channel_id, error = %e, "Could not move owner into new channel");
                false
            }
        }
    }

    async fn discard(&self, guild_id: GuildId, channel_id: ChannelId) {
        if let Err(e) = self
            .directory
            .delete_channel(guild_id, channel_id, "Temporary channel setup failed")
            .await
        {
            warn!(channel_id = %channel_id, error = %e, "Could not remove partially created channel");
        }
    }

    /// A member left `channel_id`; start the grace period if it is now empty
    ///
    /// Returns true when a deletion was scheduled.
    pub async fn on_member_left(
        self: &Arc<Self>,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> TempVcResult<bool> {
        if !self.registry.is_temporary(&channel_id) {
            return Ok(false);
        }

        match self.directory.voice_channel(guild_id, channel_id).await? {
            None => {
                debug!(channel_id = %channel_id, "Temporary channel already gone");
                self.forget(&channel_id);
                Ok(false)
            }
            Some(channel) if channel.member_count() > 0 => Ok(false),
            Some(_) => {
                self.schedule_deletion(guild_id, channel_id);
                Ok(true)
            }
        }
    }

    /// A member joined `channel_id`; cancel any pending deletion
    pub fn on_member_joined(&self, channel_id: &ChannelId) -> bool {
        let Some(pending) = self.lock_pending().remove(channel_id) else {
            return false;
        };

        pending.handle.abort();
        telemetry::record_counter(DELETIONS_ABORTED, 1);
        debug!(channel_id = %channel_id, "Pending deletion cancelled by rejoin");
        true
    }

    /// The platform reported `channel_id` deleted
    ///
    /// Returns true when the channel was a temporary one.
    pub fn on_channel_deleted(&self, channel_id: &ChannelId) -> bool {
        if let Some(pending) = self.lock_pending().remove(channel_id) {
            pending.handle.abort();
        }

        match self.forget(channel_id) {
            Some(owner_id) => {
                info!(channel_id = %channel_id, owner_id = %owner_id, "Temporary channel deleted externally");
                true
            }
            None => false,
        }
    }

    fn schedule_deletion(self: &Arc<Self>, guild_id: GuildId, channel_id: ChannelId) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let lifecycle = Arc::clone(self);
        let grace = self.grace;
        let span = tracing::info_span!("pending_deletion", channel_id = %channel_id, ticket);

        let mut pending = self.lock_pending();
        let handle = tokio::spawn(
            async move {
                tokio::time::sleep(grace).await;
                lifecycle.finish_deletion(guild_id, channel_id, ticket).await;
            }
            .instrument(span),
        );

        if let Some(previous) = pending.insert(channel_id, PendingDeletion { ticket, handle }) {
            previous.handle.abort();
            debug!(channel_id = %channel_id, "Superseded pending deletion");
        } else {
            debug!(channel_id = %channel_id, grace = ?grace, "Scheduled deletion of empty channel");
        }
    }

    async fn finish_deletion(&self, guild_id: GuildId, channel_id: ChannelId, ticket: u64) {
        {
            let mut pending = self.lock_pending();
            match pending.get(&channel_id) {
                Some(entry) if entry.ticket == ticket => {
                    pending.remove(&channel_id);
                }
                _ => return,
            }
        }

        if !self.registry.is_temporary(&channel_id) {
            return;
        }

        let channel = match self.directory.voice_channel(guild_id, channel_id).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(channel_id = %channel_id, error = %e, "Could not re-check idle channel");
                return;
            }
        };

        match channel {
            None => {
                self.forget(&channel_id);
            }
            Some(channel) if channel.member_count() > 0 => {
                telemetry::record_counter(DELETIONS_ABORTED, 1);
                debug!(channel_id = %channel_id, members = channel.member_count(), "Channel no longer empty");
            }
            Some(_) => {
                match self
                    .directory
                    .delete_channel(guild_id, channel_id, DELETE_REASON)
                    .await
                {
                    Ok(()) | Err(PlatformError::NotFound(_)) => {
                        let owner_id = self.forget(&channel_id);
                        telemetry::record_counter(CHANNELS_DELETED, 1);
                        info!(
                            guild_id = %guild_id,
                            channel_id = %channel_id,
                            owner_id = ?owner_id,
                            "Deleted idle temporary channel"
                        );
                    }
                    Err(e) => {
                        warn!(channel_id = %channel_id, error = %e, "Failed to delete idle channel");
                    }
                }
            }
        }
    }

    /// Drop all bookkeeping for a channel that no longer exists
    fn forget(&self, channel_id: &ChannelId) -> Option<UserId> {
        let owner_id = self.registry.remove(channel_id);
        self.sessions.cancel(channel_id);
        if owner_id.is_some() {
            telemetry::record_gauge(CHANNELS_ACTIVE, self.registry.len() as f64);
        }
        owner_id
    }

    /// Lifecycle state of a known channel; `None` for untracked channels
    pub fn channel_state(&self, channel_id: &ChannelId) -> Option<ChannelState> {
        if self.lock_pending().contains_key(channel_id) {
            Some(ChannelState::PendingDeletion)
        } else if self.registry.is_temporary(channel_id) {
            Some(ChannelState::Active)
        } else {
            None
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// Abort every pending deletion and control session
    pub fn shutdown(&self) -> (usize, usize) {
        let pending: Vec<_> = self.lock_pending().drain().collect();
        for (_, entry) in &pending {
            entry.handle.abort();
        }
        let sessions = self.sessions.cancel_all();
        info!(pending = pending.len(), sessions, "Lifecycle tasks stopped");
        (pending.len(), sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_voice::types::UserId;
    use crate::test_utils::GuildFixture;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_command_creation_provisions_private_channel() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        let lifecycle = f.lifecycle();
        let alice = f.member(2);

        let created = lifecycle
            .create(CreationRequest::command(f.guild_id, alice.clone()))
            .await
            .unwrap();

        assert_eq!(created.name, "Alice's Channel");
        assert_eq!(
            created.confirmation(),
            "Created channel `Alice's Channel`! Check your DMs for options."
        );
        assert!(!created.moved);
        assert!(created.session_started);

        let channel = f.platform.channel(created.record.channel_id).unwrap();
        assert_eq!(channel.parent_id, Some(f.category_id()));
        assert_eq!(channel.connect_for(PermissionTarget::DefaultRole), Some(false));
        assert_eq!(channel.connect_for(PermissionTarget::Member(alice.id)), Some(true));
        assert_eq!(lifecycle.registry().owner_of(&channel.id), Some(alice.id));
        assert_eq!(lifecycle.channel_state(&channel.id), Some(ChannelState::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_creation_is_rejected() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        let lifecycle = f.lifecycle();

        lifecycle
            .create(CreationRequest::command(f.guild_id, f.member(2)))
            .await
            .unwrap();
        let second = lifecycle
            .create(CreationRequest::command(f.guild_id, f.member(2)))
            .await;

        assert!(matches!(second, Err(TempVcError::AlreadyOwnsChannel)));
        assert_eq!(lifecycle.registry().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guild_owner_gets_no_member_overwrite() {
        let f = GuildFixture::builder().build().await;
        let created = f
            .lifecycle()
            .create(CreationRequest::command(f.guild_id, f.owner.clone()))
            .await
            .unwrap();

        let channel = f.platform.channel(created.record.channel_id).unwrap();
        assert_eq!(channel.connect_for(PermissionTarget::Member(f.owner.id)), None);
        assert_eq!(channel.connect_for(PermissionTarget::DefaultRole), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_preconditions() {
        let f = GuildFixture::builder()
            .member(2, "Alice")
            .without_setup()
            .build()
            .await;
        let result = f
            .lifecycle()
            .create(CreationRequest::command(f.guild_id, f.member(2)))
            .await;
        assert!(matches!(result, Err(TempVcError::NotConfigured)));
        assert!(f.lifecycle().registry().is_empty());

        let f = GuildFixture::builder().member(2, "Alice").build().await;
        f.platform.delete_channel_externally(f.category_id());
        let result = f
            .lifecycle()
            .create(CreationRequest::command(f.guild_id, f.member(2)))
            .await;
        assert!(matches!(result, Err(TempVcError::MissingResource(_))));
        // the reservation is released, so a later attempt is not blocked
        assert!(!f.lifecycle().registry().owner_has_channel(&UserId::new(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_creation_registers_nothing() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        f.platform.set_bot_can_manage(f.guild_id, false).unwrap();

        let result = f
            .lifecycle()
            .create(CreationRequest::command(f.guild_id, f.member(2)))
            .await;
        let err = result.unwrap_err();
        assert_eq!(
            err.user_message(),
            "❌ I lack permissions to create channels in the designated category."
        );
        assert!(f.lifecycle().registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_channel_deleted_after_grace() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        let channel_id = f.join(2, f.creator_channel_id()).await.unwrap();
        let lifecycle = f.lifecycle();

        f.leave(2).await;
        assert_eq!(
            lifecycle.channel_state(&channel_id),
            Some(ChannelState::PendingDeletion)
        );

        sleep(Duration::from_millis(4900)).await;
        assert!(f.platform.channel(channel_id).is_some());

        sleep(Duration::from_millis(200)).await;
        assert!(f.platform.channel(channel_id).is_none());
        assert!(lifecycle.registry().is_empty());
        assert_eq!(lifecycle.channel_state(&channel_id), None);
        assert!(!lifecycle.sessions().is_running(&channel_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_within_grace_keeps_channel() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        let channel_id = f.join(2, f.creator_channel_id()).await.unwrap();

        f.leave(2).await;
        sleep(Duration::from_secs(3)).await;
        f.join(2, channel_id).await;
        assert_eq!(f.lifecycle().pending_count(), 0);

        sleep(Duration::from_secs(10)).await;
        assert!(f.platform.channel(channel_id).is_some());
        assert_eq!(
            f.lifecycle().channel_state(&channel_id),
            Some(ChannelState::Active)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_empty_event_supersedes_pending_deletion() {
        let f = GuildFixture::builder()
            .member(2, "Alice")
            .member(3, "Bob")
            .build()
            .await;
        let channel_id = f.join(2, f.creator_channel_id()).await.unwrap();

        f.leave(2).await;
        sleep(Duration::from_secs(3)).await;

        // A brief visit restarts the grace period from the second leave
        f.platform.connect(f.guild_id, UserId::new(3), channel_id).unwrap();
        f.lifecycle()
            .on_member_left(f.guild_id, channel_id)
            .await
            .unwrap();
        f.platform.disconnect(f.guild_id, UserId::new(3)).unwrap();
        assert!(f
            .lifecycle()
            .on_member_left(f.guild_id, channel_id)
            .await
            .unwrap());

        sleep(Duration::from_secs(3)).await;
        assert!(f.platform.channel(channel_id).is_some());
        sleep(Duration::from_secs(3)).await;
        assert!(f.platform.channel(channel_id).is_none());
        assert_eq!(f.platform.deleted_channels(), vec![channel_id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_channel_is_forgotten() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        let channel_id = f.join(2, f.creator_channel_id()).await.unwrap();

        f.leave(2).await;
        f.platform.delete_channel_externally(channel_id);
        sleep(Duration::from_secs(6)).await;

        assert!(f.lifecycle().registry().is_empty());
        assert!(!f
            .lifecycle()
            .on_member_left(f.guild_id, channel_id)
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_deleted_event_clears_state() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        let channel_id = f.join(2, f.creator_channel_id()).await.unwrap();
        f.leave(2).await;

        let lifecycle = f.lifecycle();
        assert!(lifecycle.on_channel_deleted(&channel_id));
        assert_eq!(lifecycle.pending_count(), 0);
        assert!(lifecycle.registry().is_empty());
        assert!(!lifecycle.on_channel_deleted(&channel_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_untracked_channel_is_ignored() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        let lobby = f.platform.add_voice_channel(f.guild_id, "lobby", None).unwrap();

        assert!(!f.lifecycle().on_member_left(f.guild_id, lobby).await.unwrap());
        assert!(!f.lifecycle().on_member_joined(&lobby));
        assert_eq!(f.lifecycle().channel_state(&lobby), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_pending_deletions() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        let channel_id = f.join(2, f.creator_channel_id()).await.unwrap();
        f.leave(2).await;

        let (pending, sessions) = f.lifecycle().shutdown();
        assert_eq!((pending, sessions), (1, 1));

        sleep(Duration::from_secs(10)).await;
        assert!(f.platform.channel(channel_id).is_some());
    }
}
