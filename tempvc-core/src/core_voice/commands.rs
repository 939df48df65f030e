//! Slash command handlers
//!
//! Every command answers with an ephemeral [`CommandReply`]. Failures are
//! rendered through [`TempVcError::user_message`] so handlers only deal in
//! `Result`s.

use super::errors::{PlatformError, TempVcError, TempVcResult};
use super::guild_config::GuildConfig;
use super::lifecycle::{ChannelLifecycle, CreationRequest};
use super::platform::{PermissionOverwrite, PermissionTarget, VoiceChannel};
use super::types::{ChannelId, GuildId, Member, UserId};
use crate::telemetry::Timer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SETUP_FORBIDDEN: &str =
    "I lack server-wide permissions to create or manage categories. Please check my role permissions.";
const MANAGE_REQUIRED: &str = "You need the Manage Channels permission to run this command.";
const CHANNEL_FORBIDDEN: &str = "I lack permissions to manage your channel.";

/// Who invoked a command, and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    pub guild_id: GuildId,
    pub member: Member,
    /// Caller holds the manage-channels permission
    #[serde(default)]
    pub can_manage_channels: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    Setup,
    #[serde(rename = "createvc")]
    CreateVc,
    Invite { target: UserId },
    Kick { target: UserId },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Setup => "setup",
            Command::CreateVc => "createvc",
            Command::Invite { .. } => "invite",
            Command::Kick { .. } => "kick",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub context: CommandContext,
    pub command: Command,
}

/// Response to a command, only visible to the caller when ephemeral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReply {
    pub content: String,
    pub ephemeral: bool,
}

impl CommandReply {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

fn setup_error(e: PlatformError) -> TempVcError {
    match e {
        PlatformError::Forbidden(_) => TempVcError::PermissionDenied(SETUP_FORBIDDEN.to_string()),
        other => TempVcError::Platform(other),
    }
}

fn channel_error(e: PlatformError) -> TempVcError {
    match e {
        PlatformError::Forbidden(_) => TempVcError::PermissionDenied(CHANNEL_FORBIDDEN.to_string()),
        other => TempVcError::Platform(other),
    }
}

/// `setup`, `createvc`, `invite` and `kick`
pub struct CommandSurface {
    lifecycle: Arc<ChannelLifecycle>,
}

impl CommandSurface {
    pub fn new(lifecycle: Arc<ChannelLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Run a command and render its outcome for the caller
    pub async fn execute(&self, invocation: CommandInvocation) -> CommandReply {
        let CommandInvocation { context, command } = invocation;
        let timer = Timer::command(command.name());

        let result = match command {
            Command::Setup => self.setup(&context).await,
            Command::CreateVc => self.createvc(&context).await,
            Command::Invite { target } => self.invite(&context, target).await,
            Command::Kick { target } => self.kick(&context, target).await,
        };
        timer.stop();

        match result {
            Ok(content) => CommandReply::ephemeral(content),
            Err(e) => {
                if e.is_recoverable_by_setup() {
                    warn!(
                        command = command.name(),
                        guild_id = %context.guild_id,
                        error = %e,
                        "Guild needs /setup"
                    );
                } else {
                    debug!(
                        command = command.name(),
                        guild_id = %context.guild_id,
                        user_id = %context.member.id,
                        error = %e,
                        "Command failed"
                    );
                }
                CommandReply::ephemeral(e.user_message())
            }
        }
    }

    /// Create (or adopt) the category and creator channel, then persist them
    pub async fn setup(&self, ctx: &CommandContext) -> TempVcResult<String> {
        if !ctx.can_manage_channels {
            return Err(TempVcError::PermissionDenied(MANAGE_REQUIRED.to_string()));
        }

        let directory = self.lifecycle.directory();
        let names = self.lifecycle.channel_config();
        let guild_id = ctx.guild_id;

        let category_id = match directory
            .find_category(guild_id, &names.category_name)
            .await?
        {
            Some(existing) => {
                directory
                    .set_permission(
                        guild_id,
                        existing,
                        PermissionTarget::Bot,
                        PermissionOverwrite::bot_management(),
                    )
                    .await
                    .map_err(setup_error)?;
                existing
            }
            None => directory
                .create_category(
                    guild_id,
                    &names.category_name,
                    PermissionOverwrite::bot_management(),
                )
                .await
                .map_err(setup_error)?,
        };

        let creator_channel_id = match directory
            .find_voice_channel(guild_id, category_id, &names.creator_channel_name)
            .await?
        {
            Some(existing) => existing,
            None => {
                directory
                    .create_voice_channel(guild_id, category_id, &names.creator_channel_name)
                    .await
                    .map_err(setup_error)?
                    .id
            }
        };

        self.lifecycle
            .guild_configs()
            .set(
                guild_id,
                GuildConfig {
                    category_id,
                    creator_channel_id,
                },
            )
            .await?;

        info!(
            guild_id = %guild_id,
            category_id = %category_id,
            creator_channel_id = %creator_channel_id,
            "Guild setup complete"
        );
        Ok(format!(
            "✅ Setup complete. The `{}` category and `{}` channel are ready.",
            names.category_name, names.creator_channel_name
        ))
    }

    pub async fn createvc(&self, ctx: &CommandContext) -> TempVcResult<String> {
        let created = self
            .lifecycle
            .create(CreationRequest::command(ctx.guild_id, ctx.member.clone()))
            .await?;
        Ok(created.confirmation())
    }

    /// Let `target` connect to the caller's channel
    pub async fn invite(&self, ctx: &CommandContext, target: UserId) -> TempVcResult<String> {
        let channel = self.owned_channel(ctx).await?;

        self.lifecycle
            .directory()
            .set_permission(
                ctx.guild_id,
                channel.id,
                PermissionTarget::Member(target),
                PermissionOverwrite::allow_connect(),
            )
            .await
            .map_err(channel_error)?;

        info!(channel_id = %channel.id, target = %target, "Member invited");
        Ok(format!("✅ Invited {} to `{}`.", target.mention(), channel.name))
    }

    /// Disconnect `target` from the caller's channel
    pub async fn kick(&self, ctx: &CommandContext, target: UserId) -> TempVcResult<String> {
        let channel = self.owned_channel(ctx).await?;
        let directory = self.lifecycle.directory();

        if directory.guild_owner(ctx.guild_id).await? == target {
            return Err(TempVcError::ProtectedTarget(target));
        }
        if !channel.has_member(&target) {
            return Err(TempVcError::TargetNotInChannel(target));
        }

        directory
            .move_member(ctx.guild_id, target, None)
            .await
            .map_err(channel_error)?;

        info!(channel_id = %channel.id, target = %target, "Member kicked");
        Ok(format!("✅ Kicked {} from `{}`.", target.mention(), channel.name))
    }

    /// The temporary channel the caller is in, if they own it
    async fn owned_channel(&self, ctx: &CommandContext) -> TempVcResult<VoiceChannel> {
        let directory = self.lifecycle.directory();
        let current: Option<ChannelId> = directory
            .member_voice_channel(ctx.guild_id, ctx.member.id)
            .await?;
        let Some(channel_id) = current else {
            return Err(TempVcError::NotInVoiceChannel);
        };

        if self.lifecycle.registry().owner_of(&channel_id) != Some(ctx.member.id) {
            return Err(TempVcError::NotYourChannel(channel_id));
        }

        directory
            .voice_channel(ctx.guild_id, channel_id)
            .await?
            .ok_or(TempVcError::NotInVoiceChannel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::GuildFixture;

    fn ctx(f: &GuildFixture, user: u64) -> CommandContext {
        CommandContext {
            guild_id: f.guild_id,
            member: f.member(user),
            can_manage_channels: false,
        }
    }

    #[test]
    fn test_command_deserialization() {
        let cmd: Command = serde_json::from_str(r#"{"name": "kick", "target": 7}"#).unwrap();
        assert_eq!(cmd, Command::Kick { target: UserId::new(7) });

        let cmd: Command = serde_json::from_str(r#"{"name": "createvc"}"#).unwrap();
        assert_eq!(cmd, Command::CreateVc);
        assert_eq!(cmd.name(), "createvc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_creates_category_and_creator() {
        let f = GuildFixture::builder().without_setup().build().await;
        let admin = CommandContext {
            can_manage_channels: true,
            ..ctx(&f, f.owner.id.get())
        };

        let reply = f.commands().setup(&admin).await.unwrap();
        assert_eq!(
            reply,
            "✅ Setup complete. The `Temporary Channels` category and `➕ Create VC` channel are ready."
        );

        let config = f.guild_configs.get(f.guild_id).await.unwrap();
        let category = f.platform.channel(config.category_id).unwrap();
        assert_eq!(category.name, "Temporary Channels");
        assert_eq!(
            category.overwrite(PermissionTarget::Bot),
            Some(PermissionOverwrite::bot_management())
        );
        let creator = f.platform.channel(config.creator_channel_id).unwrap();
        assert_eq!(creator.name, "➕ Create VC");
        assert_eq!(creator.parent_id, Some(config.category_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_is_idempotent() {
        let f = GuildFixture::builder().build().await;
        let admin = CommandContext {
            can_manage_channels: true,
            ..ctx(&f, f.owner.id.get())
        };
        let before = f.platform.channels(f.guild_id).len();

        f.commands().setup(&admin).await.unwrap();

        assert_eq!(f.platform.channels(f.guild_id).len(), before);
        let config = f.guild_configs.get(f.guild_id).await.unwrap();
        assert_eq!(config.category_id, f.category_id());
        assert_eq!(config.creator_channel_id, f.creator_channel_id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_permission_errors() {
        let f = GuildFixture::builder().without_setup().build().await;

        let reply = f
            .commands()
            .execute(CommandInvocation {
                context: ctx(&f, f.owner.id.get()),
                command: Command::Setup,
            })
            .await;
        assert_eq!(reply.content, format!("❌ {}", MANAGE_REQUIRED));
        assert!(reply.ephemeral);

        f.platform.set_bot_can_manage(f.guild_id, false).unwrap();
        let reply = f
            .commands()
            .execute(CommandInvocation {
                context: CommandContext {
                    can_manage_channels: true,
                    ..ctx(&f, f.owner.id.get())
                },
                command: Command::Setup,
            })
            .await;
        assert_eq!(
            reply.content,
            "❌ I lack server-wide permissions to create or manage categories. Please check my role permissions."
        );
        assert!(f.guild_configs.get(f.guild_id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_createvc_replies() {
        let f = GuildFixture::builder().member(2, "Alice").build().await;
        let invocation = CommandInvocation {
            context: ctx(&f, 2),
            command: Command::CreateVc,
        };

        let reply = f.commands().execute(invocation.clone()).await;
        assert_eq!(
            reply.content,
            "Created channel `Alice's Channel`! Check your DMs for options."
        );

        let reply = f.commands().execute(invocation).await;
        assert_eq!(reply.content, "You already have a temporary voice channel.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invite_grants_connect() {
        let f = GuildFixture::builder()
            .member(2, "Alice")
            .member(3, "Bob")
            .build()
            .await;
        let channel_id = f.join(2, f.creator_channel_id()).await.unwrap();

        let reply = f.commands().invite(&ctx(&f, 2), UserId::new(3)).await.unwrap();
        assert_eq!(reply, "✅ Invited <@3> to `Alice's Channel`.");

        let channel = f.platform.channel(channel_id).unwrap();
        assert_eq!(
            channel.connect_for(PermissionTarget::Member(UserId::new(3))),
            Some(true)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invite_and_kick_require_ownership() {
        let f = GuildFixture::builder()
            .member(2, "Alice")
            .member(3, "Bob")
            .build()
            .await;

        let err = f
            .commands()
            .invite(&ctx(&f, 3), UserId::new(2))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "You're not in a voice channel.");

        let channel_id = f.join(2, f.creator_channel_id()).await.unwrap();
        f.join(3, channel_id).await;

        let err = f
            .commands()
            .kick(&ctx(&f, 3), UserId::new(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TempVcError::NotYourChannel(id) if id == channel_id));
        assert_eq!(err.user_message(), "This isn't your temporary channel.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_rules() {
        let f = GuildFixture::builder()
            .member(2, "Alice")
            .member(3, "Bob")
            .member(4, "Carol")
            .build()
            .await;
        let channel_id = f.join(2, f.creator_channel_id()).await.unwrap();
        f.join(3, channel_id).await;
        f.join(f.owner.id.get(), channel_id).await;

        let owner_kick = f.commands().kick(&ctx(&f, 2), f.owner.id).await;
        assert!(matches!(owner_kick, Err(TempVcError::ProtectedTarget(_))));
        assert!(f.platform.voice_members(f.guild_id, channel_id).contains(&f.owner.id));

        let absent = f.commands().kick(&ctx(&f, 2), UserId::new(4)).await;
        assert_eq!(absent.unwrap_err().user_message(), "<@4> is not in this channel.");

        let reply = f.commands().kick(&ctx(&f, 2), UserId::new(3)).await.unwrap();
        assert_eq!(reply, "✅ Kicked <@3> from `Alice's Channel`.");
        assert_eq!(f.platform.voice_channel_of(f.guild_id, UserId::new(3)), None);
    }
}
