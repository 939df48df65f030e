//! Event dispatch
//!
//! [`TempVcBot`] wires the registry, lifecycle, sessions and commands
//! together and routes platform events to them. The event loop hands each
//! event to its own task so a slow platform call never holds up the rest.

use super::commands::{CommandInvocation, CommandReply, CommandSurface};
use super::events::VoiceStateUpdate;
use super::guild_config::GuildConfigStore;
use super::lifecycle::{ChannelLifecycle, CreationRequest};
use super::platform::{DirectMessages, GuildDirectory};
use super::registry::OwnershipRegistry;
use super::session::SessionTable;
use super::types::{ChannelId, GuildId};
use crate::config::Config;
use crate::shutdown::ShutdownSignal;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};

/// Inbound events from the platform gateway
#[derive(Debug)]
pub enum BotEvent {
    VoiceStateUpdate(VoiceStateUpdate),
    ChannelDeleted {
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    Command {
        invocation: CommandInvocation,
        respond_to: oneshot::Sender<CommandReply>,
    },
}

pub struct TempVcBot {
    lifecycle: Arc<ChannelLifecycle>,
    commands: CommandSurface,
}

impl TempVcBot {
    pub fn new(
        config: &Config,
        directory: Arc<dyn GuildDirectory>,
        messages: Arc<dyn DirectMessages>,
        guild_configs: Arc<GuildConfigStore>,
    ) -> Self {
        let sessions = SessionTable::new(
            Arc::clone(&directory),
            messages,
            config.session.clone(),
        );
        let lifecycle = Arc::new(ChannelLifecycle::new(
            directory,
            Arc::new(OwnershipRegistry::new()),
            guild_configs,
            sessions,
            config.channels.clone(),
            config.lifecycle.empty_channel_grace,
        ));

        Self {
            commands: CommandSurface::new(Arc::clone(&lifecycle)),
            lifecycle,
        }
    }

    pub fn lifecycle(&self) -> &Arc<ChannelLifecycle> {
        &self.lifecycle
    }

    pub fn registry(&self) -> &Arc<OwnershipRegistry> {
        self.lifecycle.registry()
    }

    pub fn commands(&self) -> &CommandSurface {
        &self.commands
    }

    /// Route a voice change: leave first, then join, then the creator check
    pub async fn handle_voice_state_update(&self, update: VoiceStateUpdate) {
        let guild_id = update.guild_id;

        if let Some(left) = update.left_channel() {
            if let Err(e) = self.lifecycle.on_member_left(guild_id, left).await {
                warn!(guild_id = %guild_id, channel_id = %left, error = %e, "Failed to handle channel leave");
            }
        }

        let Some(joined) = update.joined_channel() else {
            return;
        };
        self.lifecycle.on_member_joined(&joined);

        let Some(config) = self.lifecycle.guild_configs().get(guild_id).await else {
            return;
        };
        if joined != config.creator_channel_id {
            return;
        }

        // Auto-join failures are logged inside `create` and otherwise ignored
        let request = CreationRequest::auto_join(guild_id, update.member, joined);
        let _ = self.lifecycle.create(request).await;
    }

    pub fn handle_channel_deleted(&self, guild_id: GuildId, channel_id: ChannelId) {
        if self.lifecycle.on_channel_deleted(&channel_id) {
            debug!(guild_id = %guild_id, channel_id = %channel_id, "Cleared deleted temporary channel");
        }
    }

    pub async fn handle_command(&self, invocation: CommandInvocation) -> CommandReply {
        self.commands.execute(invocation).await
    }

    pub async fn handle_event(&self, event: BotEvent) {
        match event {
            BotEvent::VoiceStateUpdate(update) => self.handle_voice_state_update(update).await,
            BotEvent::ChannelDeleted {
                guild_id,
                channel_id,
            } => self.handle_channel_deleted(guild_id, channel_id),
            BotEvent::Command {
                invocation,
                respond_to,
            } => {
                let reply = self.handle_command(invocation).await;
                if respond_to.send(reply).is_err() {
                    debug!("Command reply dropped, caller went away");
                }
            }
        }
    }

    /// Drain `events` until the sender closes or a shutdown signal arrives
    ///
    /// Returns the number of events dispatched. Pending deletions and control
    /// sessions are aborted on the way out.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<BotEvent>,
        mut shutdown: broadcast::Receiver<ShutdownSignal>,
    ) -> usize {
        info!("TempVC event loop started");
        let mut handlers = JoinSet::new();
        let mut dispatched = 0usize;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Event stream closed");
                        break;
                    };
                    dispatched += 1;
                    let bot = Arc::clone(&self);
                    let span = tracing::debug_span!("event", seq = dispatched);
                    handlers.spawn(async move { bot.handle_event(event).await }.instrument(span));
                }
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Event handler panicked");
                    }
                }
                signal = shutdown.recv() => {
                    info!(signal = ?signal, "Shutdown requested");
                    break;
                }
            }
        }

        // Let in-flight handlers finish so no channel is left half-created
        while let Some(joined) = handlers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Event handler panicked");
            }
        }

        self.lifecycle.shutdown();
        info!(events = dispatched, "TempVC event loop stopped");
        dispatched
    }
}
