//! Temporary voice channels
//!
//! Members get a private voice channel of their own by joining a designated
//! creator channel or by running `createvc`. The channel is deleted once it
//! has stayed empty for a short grace period.
//!
//! # Architecture
//!
//! ```text
//! BotEvent ──▶ TempVcBot ──▶ CommandSurface
//!                  │               │
//!                  ▼               ▼
//!           ChannelLifecycle ◀─────┘
//!             │      │      │
//!             ▼      ▼      ▼
//!   OwnershipRegistry │  SessionTable ──▶ ControlSession
//!                     ▼
//!             GuildConfigStore
//! ```
//!
//! All platform access goes through the [`GuildDirectory`] and
//! [`DirectMessages`] traits.
//!
//! ## Invariants
//!
//! - At most one live temporary channel per owner
//! - A record exists exactly while its channel does
//! - An empty temporary channel is deleted only after the grace period, and
//!   only if it is still empty

// Core types and errors
pub mod types;
pub mod errors;
pub mod events;

// Platform boundary
pub mod platform;
pub mod adapters;

// State
pub mod registry;
pub mod guild_config;

// Behaviour
pub mod session;
pub mod lifecycle;
pub mod commands;
pub mod bot;

// Re-exports
pub use types::{ChannelId, ChannelState, GuildId, Member, MessageId, TempChannelRecord, UserId};
pub use errors::{PlatformError, PlatformResult, RegistryError, TempVcError, TempVcResult};
pub use events::VoiceStateUpdate;
pub use platform::{
    ControlChoice, ControlPanel, DirectMessages, DmChannel, GuildDirectory, PermissionOverwrite,
    PermissionTarget, VoiceChannel,
};
pub use adapters::InMemoryPlatform;
pub use registry::{OwnerReservation, OwnershipRegistry};
pub use guild_config::{GuildConfig, GuildConfigStore};
pub use session::{ControlSession, SessionOutcome, SessionTable};
pub use lifecycle::{ChannelLifecycle, CreatedChannel, CreationRequest, CreationTrigger};
pub use commands::{Command, CommandContext, CommandInvocation, CommandReply, CommandSurface};
pub use bot::{BotEvent, TempVcBot};
