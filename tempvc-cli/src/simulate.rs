//! Replays a [`Script`] against the in-memory platform through the real bot

use crate::script::{Script, Step};
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tempvc_core::config::Config;
use tempvc_core::core_voice::adapters::{ChannelKind, InMemoryPlatform};
use tempvc_core::core_voice::{
    BotEvent, ChannelId, CommandContext, CommandInvocation, GuildConfig, GuildConfigStore, GuildId,
    Member, PermissionTarget, TempChannelRecord, TempVcBot, UserId,
};
use tokio::sync::oneshot;
use tracing::debug;

/// Virtual time granted to background tasks after every step
const SETTLE: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Serialize)]
pub struct ChannelView {
    pub id: ChannelId,
    pub name: String,
    pub user_limit: u32,
    pub members: Vec<UserId>,
    pub owner: Option<UserId>,
    /// Explicit connect setting for the default role
    pub public: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuildView {
    pub guild_id: GuildId,
    pub config: Option<GuildConfig>,
    pub voice_channels: Vec<ChannelView>,
}

/// Final state printed after a simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimulationState {
    pub guilds: Vec<GuildView>,
    pub records: Vec<TempChannelRecord>,
    pub pending_deletions: usize,
    pub active_sessions: usize,
}

pub struct Simulation {
    platform: Arc<InMemoryPlatform>,
    guild_configs: Arc<GuildConfigStore>,
    bot: Arc<TempVcBot>,
    guilds: BTreeSet<GuildId>,
    users: BTreeSet<UserId>,
    dms_seen: BTreeMap<UserId, usize>,
    transcript: Vec<String>,
}

impl Simulation {
    /// Simulation with an in-memory guild config store
    pub fn new(config: &Config) -> Self {
        Self::with_store(config, Arc::new(GuildConfigStore::in_memory()))
    }

    pub fn with_store(config: &Config, guild_configs: Arc<GuildConfigStore>) -> Self {
        let platform = Arc::new(InMemoryPlatform::new());
        let bot = Arc::new(TempVcBot::new(
            config,
            platform.clone(),
            platform.clone(),
            Arc::clone(&guild_configs),
        ));

        Self {
            platform,
            guild_configs,
            bot,
            guilds: BTreeSet::new(),
            users: BTreeSet::new(),
            dms_seen: BTreeMap::new(),
            transcript: Vec::new(),
        }
    }

    pub fn platform(&self) -> &Arc<InMemoryPlatform> {
        &self.platform
    }

    pub fn bot(&self) -> &Arc<TempVcBot> {
        &self.bot
    }

    /// Everything the bot said so far, in order
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Take the transcript lines produced since the last call
    pub fn drain_transcript(&mut self) -> Vec<String> {
        std::mem::take(&mut self.transcript)
    }

    pub async fn run(&mut self, script: &Script) -> Result<()> {
        for (line, step) in &script.steps {
            self.step(step)
                .await
                .with_context(|| format!("step on line {} failed", line))?;
        }
        Ok(())
    }

    pub async fn step(&mut self, step: &Step) -> Result<()> {
        debug!(step = ?step, "Running simulation step");

        match step {
            Step::Guild {
                id,
                owner,
                owner_name,
            } => {
                let guild_id = GuildId::new(*id);
                let owner = UserId::new(*owner);
                self.platform
                    .add_guild(guild_id, Member::new(owner, owner_name.as_str()));
                self.guilds.insert(guild_id);
                self.users.insert(owner);
            }
            Step::Member { guild, id, name } => {
                let user_id = UserId::new(*id);
                self.platform
                    .add_member(GuildId::new(*guild), Member::new(user_id, name.as_str()))?;
                self.users.insert(user_id);
            }
            Step::Command {
                guild,
                user,
                manage_channels,
                command,
            } => {
                let guild_id = GuildId::new(*guild);
                let member = self.platform.member(guild_id, UserId::new(*user));
                let (respond_to, reply) = oneshot::channel();
                let event = BotEvent::Command {
                    invocation: CommandInvocation {
                        context: CommandContext {
                            guild_id,
                            member: member.clone(),
                            can_manage_channels: *manage_channels,
                        },
                        command: *command,
                    },
                    respond_to,
                };
                self.bot.handle_event(event).await;
                let reply = reply.await.context("command produced no reply")?;
                self.transcript.push(format!(
                    "[/{}] {}: {}",
                    command.name(),
                    member.display_name,
                    reply.content
                ));
            }
            Step::Join {
                guild,
                user,
                channel,
            } => {
                let guild_id = GuildId::new(*guild);
                let channel_id = self.voice_channel_named(guild_id, channel)?;
                let update = self
                    .platform
                    .connect(guild_id, UserId::new(*user), channel_id)?;
                self.bot
                    .handle_event(BotEvent::VoiceStateUpdate(update))
                    .await;
            }
            Step::Leave { guild, user } => {
                let update = self
                    .platform
                    .disconnect(GuildId::new(*guild), UserId::new(*user))?;
                self.bot
                    .handle_event(BotEvent::VoiceStateUpdate(update))
                    .await;
            }
            Step::React { user, choice } => {
                if !self.platform.react(UserId::new(*user), *choice) {
                    self.transcript
                        .push(format!("(reaction from {} ignored)", UserId::new(*user)));
                }
            }
            Step::Reply { user, text } => {
                if !self.platform.reply(UserId::new(*user), text.as_str()) {
                    self.transcript
                        .push(format!("(reply from {} ignored)", UserId::new(*user)));
                }
            }
            Step::Wait { duration } => {
                tokio::time::sleep(*duration).await;
            }
            Step::DeleteChannel { guild, channel } => {
                let guild_id = GuildId::new(*guild);
                let channel_id = self.voice_channel_named(guild_id, channel)?;
                let evicted = self.platform.delete_channel_externally(channel_id);
                self.bot
                    .handle_event(BotEvent::ChannelDeleted {
                        guild_id,
                        channel_id,
                    })
                    .await;
                for update in evicted {
                    self.bot
                        .handle_event(BotEvent::VoiceStateUpdate(update))
                        .await;
                }
            }
            Step::BlockDms { user } => self.platform.block_dms(UserId::new(*user)),
            Step::BotPermissions { guild, manage } => {
                self.platform
                    .set_bot_can_manage(GuildId::new(*guild), *manage)?;
            }
        }

        self.settle().await;
        Ok(())
    }

    /// Let background tasks run, feed back bot-caused voice changes and
    /// collect new DMs
    async fn settle(&mut self) {
        loop {
            tokio::time::sleep(SETTLE).await;
            let updates = self.platform.take_voice_updates();
            if updates.is_empty() {
                break;
            }
            for update in updates {
                self.bot
                    .handle_event(BotEvent::VoiceStateUpdate(update))
                    .await;
            }
        }

        for user in &self.users {
            let messages = self.platform.dm_messages(*user);
            let seen = self.dms_seen.entry(*user).or_insert(0);
            for message in messages.iter().skip(*seen) {
                let content = message.content.replace('\n', "\n    ");
                self.transcript.push(format!("[dm {}] {}", user, content));
            }
            *seen = messages.len();
        }
    }

    fn voice_channel_named(&self, guild_id: GuildId, name: &str) -> Result<ChannelId> {
        self.platform
            .channels(guild_id)
            .into_iter()
            .find(|c| c.kind == ChannelKind::Voice && c.name == name)
            .map(|c| c.id)
            .ok_or_else(|| anyhow!("no voice channel named {:?} in guild {}", name, guild_id))
    }

    pub async fn state(&self) -> SimulationState {
        let registry = self.bot.registry();
        let mut guilds = Vec::with_capacity(self.guilds.len());

        for guild_id in &self.guilds {
            let voice_channels = self
                .platform
                .channels(*guild_id)
                .into_iter()
                .filter(|c| c.kind == ChannelKind::Voice)
                .map(|c| ChannelView {
                    id: c.id,
                    public: c.connect_for(PermissionTarget::DefaultRole),
                    owner: registry.owner_of(&c.id),
                    members: self.platform.voice_members(*guild_id, c.id),
                    name: c.name,
                    user_limit: c.user_limit,
                })
                .collect();

            guilds.push(GuildView {
                guild_id: *guild_id,
                config: self.guild_configs.get(*guild_id).await,
                voice_channels,
            });
        }

        SimulationState {
            guilds,
            records: registry.records(),
            pending_deletions: self.bot.lifecycle().pending_count(),
            active_sessions: self.bot.lifecycle().sessions().len(),
        }
    }

    /// Stop pending deletions and control sessions
    pub fn finish(&self) {
        self.bot.lifecycle().shutdown();
    }
}

/// Fail fast on scripts that reference guilds before creating them
pub fn check_script(script: &Script) -> Result<()> {
    let mut guilds = BTreeSet::new();
    for (line, step) in &script.steps {
        let guild = match step {
            Step::Guild { id, .. } => {
                guilds.insert(*id);
                continue;
            }
            Step::Member { guild, .. }
            | Step::Command { guild, .. }
            | Step::Join { guild, .. }
            | Step::Leave { guild, .. }
            | Step::DeleteChannel { guild, .. }
            | Step::BotPermissions { guild, .. } => *guild,
            Step::React { .. } | Step::Reply { .. } | Step::Wait { .. } | Step::BlockDms { .. } => {
                continue
            }
        };
        if !guilds.contains(&guild) {
            bail!("line {}: guild {} is used before it is created", line, guild);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_script_rejects_unknown_guild() {
        let script = Script::parse(
            r#"{"step": "member", "guild": 5, "id": 2, "name": "Alice"}"#,
        )
        .unwrap();
        assert!(check_script(&script).is_err());

        let script = Script::parse(
            "{\"step\": \"guild\", \"id\": 5, \"owner\": 1}\n{\"step\": \"member\", \"guild\": 5, \"id\": 2, \"name\": \"Alice\"}",
        )
        .unwrap();
        assert!(check_script(&script).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_unknown_channel_fails() {
        let mut sim = Simulation::new(&Config::default());
        sim.step(&Step::Guild {
            id: 1,
            owner: 1,
            owner_name: "Owner".to_string(),
        })
        .await
        .unwrap();

        let result = sim
            .step(&Step::Join {
                guild: 1,
                user: 1,
                channel: "nowhere".to_string(),
            })
            .await;
        assert!(result.is_err());
    }
}
