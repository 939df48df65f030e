//! Guild fixtures over the in-memory platform

use crate::config::Config;
use crate::core_voice::adapters::InMemoryPlatform;
use crate::core_voice::bot::TempVcBot;
use crate::core_voice::commands::CommandSurface;
use crate::core_voice::events::VoiceStateUpdate;
use crate::core_voice::guild_config::{GuildConfig, GuildConfigStore};
use crate::core_voice::lifecycle::ChannelLifecycle;
use crate::core_voice::platform::{GuildDirectory, PermissionOverwrite};
use crate::core_voice::types::{ChannelId, GuildId, Member, UserId};
use std::collections::VecDeque;
use std::sync::Arc;

/// A guild with a running bot, optionally already set up
pub struct GuildFixture {
    pub platform: Arc<InMemoryPlatform>,
    pub guild_id: GuildId,
    /// Guild owner, user id 1 unless overridden
    pub owner: Member,
    pub config: Config,
    pub guild_configs: Arc<GuildConfigStore>,
    pub bot: Arc<TempVcBot>,
    setup: Option<GuildConfig>,
}

pub struct GuildFixtureBuilder {
    guild_id: GuildId,
    owner: Member,
    members: Vec<Member>,
    config: Config,
    setup: bool,
}

impl GuildFixtureBuilder {
    pub fn guild_id(mut self, id: u64) -> Self {
        self.guild_id = GuildId::new(id);
        self
    }

    pub fn owner(mut self, id: u64, name: &str) -> Self {
        self.owner = Member::new(UserId::new(id), name);
        self
    }

    pub fn member(mut self, id: u64, name: &str) -> Self {
        self.members.push(Member::new(UserId::new(id), name));
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Leave the guild unconfigured, as if `setup` never ran
    pub fn without_setup(mut self) -> Self {
        self.setup = false;
        self
    }

    pub fn without_sessions(mut self) -> Self {
        self.config.session.enabled = false;
        self
    }

    pub async fn build(self) -> GuildFixture {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.add_guild(self.guild_id, self.owner.clone());
        for member in &self.members {
            platform
                .add_member(self.guild_id, member.clone())
                .expect("guild was just added");
        }

        let guild_configs = Arc::new(GuildConfigStore::in_memory());
        let setup = if self.setup {
            let channels = &self.config.channels;
            let category_id = platform
                .create_category(
                    self.guild_id,
                    &channels.category_name,
                    PermissionOverwrite::bot_management(),
                )
                .await
                .expect("fixture category");
            let creator_channel_id = platform
                .create_voice_channel(self.guild_id, category_id, &channels.creator_channel_name)
                .await
                .expect("fixture creator channel")
                .id;
            let config = GuildConfig {
                category_id,
                creator_channel_id,
            };
            guild_configs
                .set(self.guild_id, config)
                .await
                .expect("in-memory store");
            Some(config)
        } else {
            None
        };

        let bot = Arc::new(TempVcBot::new(
            &self.config,
            platform.clone(),
            platform.clone(),
            Arc::clone(&guild_configs),
        ));

        GuildFixture {
            platform,
            guild_id: self.guild_id,
            owner: self.owner,
            config: self.config,
            guild_configs,
            bot,
            setup,
        }
    }
}

impl GuildFixture {
    pub fn builder() -> GuildFixtureBuilder {
        GuildFixtureBuilder {
            guild_id: GuildId::new(100),
            owner: Member::new(UserId::new(1), "Owner"),
            members: Vec::new(),
            config: Config::default(),
            setup: true,
        }
    }

    pub fn member(&self, id: u64) -> Member {
        self.platform.member(self.guild_id, UserId::new(id))
    }

    pub fn lifecycle(&self) -> &Arc<ChannelLifecycle> {
        self.bot.lifecycle()
    }

    pub fn commands(&self) -> &CommandSurface {
        self.bot.commands()
    }

    pub fn category_id(&self) -> ChannelId {
        self.setup.expect("fixture built without setup").category_id
    }

    pub fn creator_channel_id(&self) -> ChannelId {
        self.setup
            .expect("fixture built without setup")
            .creator_channel_id
    }

    /// Connect `user` to `channel_id` and let the bot react
    ///
    /// Returns the channel the user ends up in, which differs from
    /// `channel_id` when joining the creator channel.
    pub async fn join(&self, user: u64, channel_id: ChannelId) -> Option<ChannelId> {
        let user_id = UserId::new(user);
        let update = self
            .platform
            .connect(self.guild_id, user_id, channel_id)
            .expect("voice channel exists");
        self.dispatch(update).await;
        self.platform.voice_channel_of(self.guild_id, user_id)
    }

    /// Disconnect `user` from voice and let the bot react
    pub async fn leave(&self, user: u64) {
        let update = self
            .platform
            .disconnect(self.guild_id, UserId::new(user))
            .expect("guild exists");
        self.dispatch(update).await;
    }

    /// Deliver voice changes the bot caused outside an update, such as a kick
    pub async fn dispatch_pending(&self) {
        for update in self.platform.take_voice_updates() {
            self.dispatch(update).await;
        }
    }

    /// Deliver `update`, then every voice change the bot itself caused
    pub async fn dispatch(&self, update: VoiceStateUpdate) {
        let mut queue = VecDeque::from([update]);
        while let Some(next) = queue.pop_front() {
            self.bot.handle_voice_state_update(next).await;
            queue.extend(self.platform.take_voice_updates());
        }
    }
}
