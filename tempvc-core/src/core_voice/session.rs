//! Owner control sessions
//!
//! After a temporary channel is created its owner receives a private control
//! panel with three options: make the channel public, make it private, or
//! set a user limit. The session loops until nothing has been picked for the
//! configured inactivity timeout, or until the channel disappears.
//!
//! ```text
//! AwaitingChoice ──choice──▶ ApplyingChoice ──▶ AwaitingChoice
//!       │                          │
//!    timeout                 channel gone
//!       ▼                          ▼
//!    Expired ◀─────────────────────┘
//! ```
//!
//! The user-limit prompt has its own, shorter timeout. Time spent in it is
//! part of handling the choice: the inactivity window starts again when the
//! session returns to waiting for the next choice.

use super::errors::{PlatformError, TempVcError, TempVcResult};
use super::platform::{
    ControlChoice, ControlPanel, DirectMessages, DmChannel, GuildDirectory, PermissionOverwrite,
    PermissionTarget,
};
use super::types::{ChannelId, GuildId, MessageId, UserId};
use crate::config::SessionConfig;
use crate::telemetry::{self, SESSIONS_EXPIRED, SESSIONS_STARTED};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

pub const EXPIRED_NOTICE: &str = "Controls have expired.";
pub const CHANNEL_GONE: &str = "Your channel no longer exists.";
pub const NOW_PUBLIC: &str = "Your channel is now public.";
pub const NOW_PRIVATE: &str = "Your channel is now private.";
pub const LIMIT_PROMPT: &str = "What user limit should I set? (Enter 0 for unlimited)";

/// How a control session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No choice within the inactivity timeout
    Expired,
    /// The channel was gone when a choice arrived
    ChannelGone,
    /// The owner cannot receive direct messages
    DmUnavailable,
}

/// Result of one user-limit prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitOutcome {
    Applied(u32),
    OutOfRange(u32),
    TimedOut,
}

/// Parse a user-limit reply: digits only, `0` meaning unlimited
///
/// Surrounding whitespace or signs make the reply non-numeric. Values too
/// large for `u32` saturate so they are refused as out of range.
pub fn parse_limit(reply: &str) -> Option<u32> {
    if reply.is_empty() || !reply.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match reply.parse::<u64>() {
        Ok(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
        Err(_) => Some(u32::MAX),
    }
}

fn limit_label(limit: u32) -> String {
    if limit == 0 {
        "unlimited".to_string()
    } else {
        limit.to_string()
    }
}

/// One owner's interactive control flow for one channel
pub struct ControlSession {
    guild_id: GuildId,
    channel_id: ChannelId,
    channel_name: String,
    owner_id: UserId,
    directory: Arc<dyn GuildDirectory>,
    messages: Arc<dyn DirectMessages>,
    settings: SessionConfig,
}

impl ControlSession {
    pub fn new(
        guild_id: GuildId,
        channel_id: ChannelId,
        channel_name: impl Into<String>,
        owner_id: UserId,
        directory: Arc<dyn GuildDirectory>,
        messages: Arc<dyn DirectMessages>,
        settings: SessionConfig,
    ) -> Self {
        Self {
            guild_id,
            channel_id,
            channel_name: channel_name.into(),
            owner_id,
            directory,
            messages,
            settings,
        }
    }

    /// Drive the session until it expires or the channel disappears
    pub async fn run(self) -> TempVcResult<SessionOutcome> {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run`](Self::run), but end early once `channel_gone` resolves
    ///
    /// The owner is told the channel is gone and the panel is marked expired.
    pub async fn run_until(
        self,
        channel_gone: impl Future<Output = ()>,
    ) -> TempVcResult<SessionOutcome> {
        let dm = match self.messages.open_dm(self.owner_id).await {
            Ok(dm) => dm,
            Err(PlatformError::Forbidden(reason)) => {
                debug!(owner_id = %self.owner_id, reason = %reason, "Owner does not accept DMs");
                return Ok(SessionOutcome::DmUnavailable);
            }
            Err(e) => return Err(e.into()),
        };

        let panel = ControlPanel::for_channel(&self.channel_name);
        let panel_id = match self.messages.send_control_panel(&dm, &panel).await {
            Ok(id) => id,
            Err(PlatformError::Forbidden(reason)) => {
                debug!(owner_id = %self.owner_id, reason = %reason, "Could not deliver control panel");
                return Ok(SessionOutcome::DmUnavailable);
            }
            Err(e) => return Err(e.into()),
        };

        tokio::select! {
            outcome = self.drive(&dm, panel_id) => outcome,
            () = channel_gone => {
                self.messages
                    .expire_control_panel(&dm, panel_id, EXPIRED_NOTICE)
                    .await?;
                self.messages.send_message(&dm, CHANNEL_GONE).await?;
                info!(channel_id = %self.channel_id, "Control session closed with its channel");
                Ok(SessionOutcome::ChannelGone)
            }
        }
    }

    async fn drive(&self, dm: &DmChannel, panel_id: MessageId) -> TempVcResult<SessionOutcome> {
        loop {
            let choice = self
                .messages
                .await_choice(dm, panel_id, self.settings.timeout)
                .await?;

            let Some(choice) = choice else {
                self.messages
                    .expire_control_panel(dm, panel_id, EXPIRED_NOTICE)
                    .await?;
                telemetry::record_counter(SESSIONS_EXPIRED, 1);
                info!(channel_id = %self.channel_id, "Control session expired");
                return Ok(SessionOutcome::Expired);
            };

            if !self
                .directory
                .channel_exists(self.guild_id, self.channel_id)
                .await?
            {
                self.messages.send_message(dm, CHANNEL_GONE).await?;
                return Ok(SessionOutcome::ChannelGone);
            }

            debug!(channel_id = %self.channel_id, choice = ?choice, "Applying control choice");
            if let Err(e) = self.apply(dm, choice).await {
                warn!(channel_id = %self.channel_id, error = %e, "Failed to apply control choice");
                self.messages
                    .send_message(dm, &format!("I couldn't update your channel: {}", e))
                    .await?;
            }

            self.clear(dm, panel_id, choice).await;
        }
    }

    async fn apply(&self, dm: &DmChannel, choice: ControlChoice) -> TempVcResult<()> {
        match choice {
            ControlChoice::Public => {
                self.set_default_connect(PermissionOverwrite::allow_connect())
                    .await?;
                self.messages.send_message(dm, NOW_PUBLIC).await?;
            }
            ControlChoice::Private => {
                self.set_default_connect(PermissionOverwrite::deny_connect())
                    .await?;
                self.messages.send_message(dm, NOW_PRIVATE).await?;
            }
            ControlChoice::SetLimit => {
                self.prompt_limit(dm).await?;
            }
        }
        Ok(())
    }

    async fn set_default_connect(&self, overwrite: PermissionOverwrite) -> TempVcResult<()> {
        self.directory
            .set_permission(
                self.guild_id,
                self.channel_id,
                PermissionTarget::DefaultRole,
                overwrite,
            )
            .await?;
        Ok(())
    }

    /// Ask for a user limit and apply it
    ///
    /// Replies that are not plain digits are ignored while the prompt is open.
    pub async fn prompt_limit(&self, dm: &DmChannel) -> TempVcResult<LimitOutcome> {
        self.messages.send_message(dm, LIMIT_PROMPT).await?;

        let deadline = Instant::now() + self.settings.limit_prompt_timeout;
        let mut limit = None;
        while limit.is_none() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.messages.await_reply(dm, remaining).await? {
                Some(reply) => limit = parse_limit(&reply),
                None => break,
            }
        }

        let Some(limit) = limit else {
            let timeout = TempVcError::Timeout("a user limit".to_string());
            debug!(channel_id = %self.channel_id, error = %timeout, "Limit prompt expired");
            self.messages
                .send_message(dm, &timeout.user_message())
                .await?;
            return Ok(LimitOutcome::TimedOut);
        };

        if limit > self.settings.max_user_limit {
            self.messages
                .send_message(
                    dm,
                    &format!(
                        "User limit must be between 0 and {}.",
                        self.settings.max_user_limit
                    ),
                )
                .await?;
            return Ok(LimitOutcome::OutOfRange(limit));
        }

        self.directory
            .set_user_limit(self.guild_id, self.channel_id, limit)
            .await?;
        self.messages
            .send_message(dm, &format!("User limit set to `{}`.", limit_label(limit)))
            .await?;
        Ok(LimitOutcome::Applied(limit))
    }

    async fn clear(&self, dm: &DmChannel, panel_id: MessageId, choice: ControlChoice) {
        if let Err(e) = self.messages.clear_choice(dm, panel_id, choice).await {
            debug!(error = %e, "Could not clear control reaction");
        }
    }
}

struct SessionEntry {
    id: u64,
    owner_id: UserId,
    channel_gone: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Running control sessions, one per temporary channel
#[derive(Clone)]
pub struct SessionTable {
    directory: Arc<dyn GuildDirectory>,
    messages: Arc<dyn DirectMessages>,
    settings: SessionConfig,
    sessions: Arc<Mutex<HashMap<ChannelId, SessionEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl SessionTable {
    pub fn new(
        directory: Arc<dyn GuildDirectory>,
        messages: Arc<dyn DirectMessages>,
        settings: SessionConfig,
    ) -> Self {
        Self {
            directory,
            messages,
            settings,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChannelId, SessionEntry>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn a control session for a freshly created channel
    ///
    /// Returns false when sessions are disabled. A session already running
    /// for the channel is replaced.
    pub fn start(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        channel_name: &str,
        owner_id: UserId,
    ) -> bool {
        if !self.settings.enabled {
            return false;
        }

        let session = ControlSession::new(
            guild_id,
            channel_id,
            channel_name,
            owner_id,
            Arc::clone(&self.directory),
            Arc::clone(&self.messages),
            self.settings.clone(),
        );
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let table = self.clone();
        let span = tracing::info_span!("control_session", channel_id = %channel_id, owner_id = %owner_id);

        let (channel_gone, gone_rx) = oneshot::channel();
        // A dropped sender means the entry was replaced or aborted, not that the channel went away
        let gone = async move {
            if gone_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        // Hold the lock across spawn so the task cannot finish before its entry exists
        let mut sessions = self.lock();
        let handle = tokio::spawn(
            async move {
                match session.run_until(gone).await {
                    Ok(outcome) => debug!(outcome = ?outcome, "Control session ended"),
                    Err(e) => warn!(error = %e, "Control session failed"),
                }
                table.finish(channel_id, id);
            }
            .instrument(span),
        );
        if let Some(previous) = sessions.insert(
            channel_id,
            SessionEntry {
                id,
                owner_id,
                channel_gone,
                handle,
            },
        ) {
            previous.handle.abort();
        }

        telemetry::record_counter(SESSIONS_STARTED, 1);
        true
    }

    fn finish(&self, channel_id: ChannelId, id: u64) {
        let mut sessions = self.lock();
        if sessions.get(&channel_id).map(|e| e.id) == Some(id) {
            sessions.remove(&channel_id);
        }
    }

    /// End the session for a channel that no longer exists
    ///
    /// The session expires its panel and tells the owner before stopping.
    pub fn cancel(&self, channel_id: &ChannelId) -> bool {
        match self.lock().remove(channel_id) {
            Some(entry) => {
                if entry.channel_gone.send(()).is_err() {
                    entry.handle.abort();
                }
                debug!(channel_id = %channel_id, owner_id = %entry.owner_id, "Cancelled control session");
                true
            }
            None => false,
        }
    }

    /// Abort every session without notifying owners
    pub fn cancel_all(&self) -> usize {
        let entries: Vec<_> = self.lock().drain().collect();
        for (_, entry) in &entries {
            entry.handle.abort();
        }
        entries.len()
    }

    pub fn is_running(&self, channel_id: &ChannelId) -> bool {
        self.lock().contains_key(channel_id)
    }

    pub fn owner_of(&self, channel_id: &ChannelId) -> Option<UserId> {
        self.lock().get(channel_id).map(|e| e.owner_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_voice::adapters::InMemoryPlatform;
    use crate::core_voice::types::Member;
    use crate::test_utils::{wait_for_condition, DEFAULT_TEST_TIMEOUT};
    use std::time::Duration;

    struct Fixture {
        platform: Arc<InMemoryPlatform>,
        guild_id: GuildId,
        channel_id: ChannelId,
        owner: UserId,
    }

    async fn fixture() -> Fixture {
        let platform = Arc::new(InMemoryPlatform::new());
        let guild_id = GuildId::new(1);
        platform.add_guild(guild_id, Member::new(UserId::new(1), "Admin"));
        let owner = UserId::new(2);
        platform
            .add_member(guild_id, Member::new(owner, "Alice"))
            .unwrap();
        let category = platform
            .create_category(guild_id, "Temporary Channels", PermissionOverwrite::bot_management())
            .await
            .unwrap();
        let channel = platform
            .create_voice_channel(guild_id, category, "Alice's Channel")
            .await
            .unwrap();

        Fixture {
            platform,
            guild_id,
            channel_id: channel.id,
            owner,
        }
    }

    fn table(f: &Fixture) -> SessionTable {
        SessionTable::new(
            f.platform.clone(),
            f.platform.clone(),
            SessionConfig::default(),
        )
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit("0"), Some(0));
        assert_eq!(parse_limit(" 5 "), None);
        assert_eq!(parse_limit("007"), Some(7));
        assert_eq!(parse_limit("-1"), None);
        assert_eq!(parse_limit("five"), None);
        assert_eq!(parse_limit("5.5"), None);
        assert_eq!(parse_limit(""), None);
        assert_eq!(parse_limit("99999999999"), Some(u32::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn test_public_and_private_toggle() {
        let f = fixture().await;
        let sessions = table(&f);
        assert!(sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner));

        f.platform.wait_for_dm(f.owner, "Channel Controls for").await;
        assert!(f.platform.react(f.owner, ControlChoice::Public));
        f.platform.wait_for_dm(f.owner, NOW_PUBLIC).await;

        let channel = f.platform.channel(f.channel_id).unwrap();
        assert_eq!(channel.connect_for(PermissionTarget::DefaultRole), Some(true));

        assert!(f.platform.react(f.owner, ControlChoice::Private));
        f.platform.wait_for_dm(f.owner, NOW_PRIVATE).await;

        let channel = f.platform.channel(f.channel_id).unwrap();
        assert_eq!(channel.connect_for(PermissionTarget::DefaultRole), Some(false));
        f.platform
            .wait_until(|p| p.cleared_choices(f.owner).len() == 2)
            .await;
        assert!(sessions.is_running(&f.channel_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_limit_zero_and_five() {
        let f = fixture().await;
        let sessions = table(&f);
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);
        f.platform.wait_for_dm(f.owner, "Channel Controls for").await;

        f.platform.react(f.owner, ControlChoice::SetLimit);
        f.platform.wait_for_dm(f.owner, LIMIT_PROMPT).await;
        f.platform.reply(f.owner, "5");
        f.platform.wait_for_dm(f.owner, "User limit set to `5`.").await;
        assert_eq!(f.platform.channel(f.channel_id).unwrap().user_limit, 5);

        f.platform.react(f.owner, ControlChoice::SetLimit);
        f.platform
            .wait_until(|p| p.dm_count(f.owner, LIMIT_PROMPT) == 2)
            .await;
        f.platform.reply(f.owner, "0");
        f.platform
            .wait_for_dm(f.owner, "User limit set to `unlimited`.")
            .await;
        assert_eq!(f.platform.channel(f.channel_id).unwrap().user_limit, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_ignores_non_numeric_replies() {
        let f = fixture().await;
        let sessions = table(&f);
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);
        f.platform.wait_for_dm(f.owner, "Channel Controls for").await;

        f.platform.react(f.owner, ControlChoice::SetLimit);
        f.platform.wait_for_dm(f.owner, LIMIT_PROMPT).await;
        assert!(f.platform.reply(f.owner, "lots"));
        let platform = &f.platform;
        assert!(wait_for_condition(|| platform.awaiting_reply(f.owner), DEFAULT_TEST_TIMEOUT).await);
        assert!(f.platform.reply(f.owner, "3"));
        f.platform.wait_for_dm(f.owner, "User limit set to `3`.").await;
        assert_eq!(f.platform.channel(f.channel_id).unwrap().user_limit, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_out_of_range_is_refused() {
        let f = fixture().await;
        let sessions = table(&f);
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);
        f.platform.wait_for_dm(f.owner, "Channel Controls for").await;

        f.platform.react(f.owner, ControlChoice::SetLimit);
        f.platform.wait_for_dm(f.owner, LIMIT_PROMPT).await;
        f.platform.reply(f.owner, "500");
        f.platform
            .wait_for_dm(f.owner, "User limit must be between 0 and 99.")
            .await;
        assert_eq!(f.platform.channel(f.channel_id).unwrap().user_limit, 0);
        assert!(sessions.is_running(&f.channel_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_prompt_timeout_returns_to_choices() {
        let f = fixture().await;
        let sessions = table(&f);
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);
        f.platform.wait_for_dm(f.owner, "Channel Controls for").await;

        let asked = Instant::now();
        f.platform.react(f.owner, ControlChoice::SetLimit);
        f.platform.wait_for_dm(f.owner, "You took too long.").await;
        assert!(asked.elapsed() >= Duration::from_secs(30));
        assert!(sessions.is_running(&f.channel_id));

        // Still accepting choices afterwards
        f.platform.react(f.owner, ControlChoice::Public);
        f.platform.wait_for_dm(f.owner, NOW_PUBLIC).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_after_inactivity() {
        let f = fixture().await;
        let sessions = table(&f);
        let started = Instant::now();
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);

        f.platform.wait_for_dm(f.owner, EXPIRED_NOTICE).await;
        assert!(started.elapsed() >= Duration::from_secs(600));

        let messages = f.platform.dm_messages(f.owner);
        assert!(messages[0].panel && messages[0].expired);
        assert!(!f.platform.react(f.owner, ControlChoice::Public));

        assert!(wait_for_condition(|| sessions.is_empty(), DEFAULT_TEST_TIMEOUT).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_choice_after_channel_deleted_ends_session() {
        let f = fixture().await;
        let sessions = table(&f);
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);
        f.platform.wait_for_dm(f.owner, "Channel Controls for").await;

        f.platform.delete_channel_externally(f.channel_id);
        f.platform.react(f.owner, ControlChoice::Public);
        f.platform.wait_for_dm(f.owner, CHANNEL_GONE).await;
        assert!(wait_for_condition(|| sessions.is_empty(), DEFAULT_TEST_TIMEOUT).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_dms_end_quietly() {
        let f = fixture().await;
        f.platform.block_dms(f.owner);

        let session = ControlSession::new(
            f.guild_id,
            f.channel_id,
            "Alice's Channel",
            f.owner,
            f.platform.clone(),
            f.platform.clone(),
            SessionConfig::default(),
        );
        assert_eq!(session.run().await.unwrap(), SessionOutcome::DmUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_sent_before_prompt_is_not_used() {
        let f = fixture().await;
        let sessions = table(&f);
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);
        f.platform.wait_for_dm(f.owner, "Channel Controls for").await;

        assert!(!f.platform.reply(f.owner, "7"));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(f.platform.react(f.owner, ControlChoice::SetLimit));
        f.platform.wait_for_dm(f.owner, "You took too long.").await;
        assert_eq!(f.platform.channel(f.channel_id).unwrap().user_limit, 0);
        assert_eq!(f.platform.dm_count(f.owner, "User limit set to"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_choice_during_limit_prompt_is_not_replayed() {
        let f = fixture().await;
        let sessions = table(&f);
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);
        f.platform.wait_for_dm(f.owner, "Channel Controls for").await;

        assert!(f.platform.react(f.owner, ControlChoice::SetLimit));
        f.platform.wait_for_dm(f.owner, LIMIT_PROMPT).await;
        assert!(!f.platform.react(f.owner, ControlChoice::Public));
        assert!(f.platform.reply(f.owner, "4"));
        f.platform.wait_for_dm(f.owner, "User limit set to `4`.").await;

        let platform = &f.platform;
        assert!(wait_for_condition(|| platform.awaiting_choice(f.owner), DEFAULT_TEST_TIMEOUT).await);
        assert_eq!(f.platform.dm_count(f.owner, NOW_PUBLIC), 0);
        let channel = f.platform.channel(f.channel_id).unwrap();
        assert_eq!(channel.connect_for(PermissionTarget::DefaultRole), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_tells_owner_and_expires_panel() {
        let f = fixture().await;
        let sessions = table(&f);
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);
        f.platform.wait_for_dm(f.owner, "Channel Controls for").await;

        assert!(sessions.cancel(&f.channel_id));
        f.platform.wait_for_dm(f.owner, CHANNEL_GONE).await;

        let panel = f.platform.dm_messages(f.owner).into_iter().find(|m| m.panel).unwrap();
        assert!(panel.expired);
        assert_eq!(panel.content, EXPIRED_NOTICE);
        assert!(!f.platform.react(f.owner, ControlChoice::Public));
        assert!(sessions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_disabled_sessions() {
        let f = fixture().await;
        let sessions = table(&f);
        sessions.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner);
        assert_eq!(sessions.owner_of(&f.channel_id), Some(f.owner));
        assert!(sessions.cancel(&f.channel_id));
        assert!(!sessions.cancel(&f.channel_id));

        let disabled = SessionTable::new(
            f.platform.clone(),
            f.platform.clone(),
            SessionConfig {
                enabled: false,
                ..SessionConfig::default()
            },
        );
        assert!(!disabled.start(f.guild_id, f.channel_id, "Alice's Channel", f.owner));
        assert!(disabled.is_empty());
    }
}
