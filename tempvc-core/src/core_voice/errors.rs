//! Error types for temporary voice channel operations

use super::types::{ChannelId, UserId};
use thiserror::Error;

/// Result type for temporary channel operations
pub type TempVcResult<T> = Result<T, TempVcError>;

/// Errors raised by the chat platform collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The bot lacks the rights for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The addressed guild, channel, member or message does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other platform failure (transport, rate limit, ...)
    #[error("Platform unavailable: {0}")]
    Unavailable(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Ownership registry errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("User {0} already owns a temporary channel")]
    OwnerAlreadyRegistered(UserId),

    #[error("User {0} already has a channel being created")]
    CreationInFlight(UserId),

    #[error("Channel {0} is already registered")]
    ChannelAlreadyRegistered(ChannelId),
}

/// Errors surfaced at the boundary of a command or event
#[derive(Error, Debug)]
pub enum TempVcError {
    /// Guild has no valid configuration
    #[error("Guild is not configured")]
    NotConfigured,

    /// A configured category or channel no longer exists
    #[error("Configured resource is missing: {0}")]
    MissingResource(String),

    /// The bot, or the caller, lacks the required rights
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("User already owns a temporary channel")]
    AlreadyOwnsChannel,

    #[error("User is not in a voice channel")]
    NotInVoiceChannel,

    #[error("Channel {0} is not owned by the caller")]
    NotYourChannel(ChannelId),

    #[error("User {0} is not in the channel")]
    TargetNotInChannel(UserId),

    #[error("User {0} cannot be targeted")]
    ProtectedTarget(UserId),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Storage error: {0}")]
    Storage(String),

    /// Registry bookkeeping disagrees with itself
    #[error("Registry error: {0}")]
    Registry(RegistryError),
}

impl From<RegistryError> for TempVcError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::OwnerAlreadyRegistered(_) | RegistryError::CreationInFlight(_) => {
                TempVcError::AlreadyOwnsChannel
            }
            RegistryError::ChannelAlreadyRegistered(_) => TempVcError::Registry(e),
        }
    }
}

impl From<crate::config::ConfigError> for TempVcError {
    fn from(e: crate::config::ConfigError) -> Self {
        TempVcError::Storage(e.to_string())
    }
}

impl TempVcError {
    /// Text shown to the user who triggered the failing operation
    pub fn user_message(&self) -> String {
        match self {
            TempVcError::NotConfigured => {
                "The server admin needs to run `/setup` first.".to_string()
            }
            TempVcError::MissingResource(_) => {
                "Error: The configured category is missing. Please ask an admin to run `/setup`."
                    .to_string()
            }
            TempVcError::PermissionDenied(reason) => format!("❌ {}", reason),
            TempVcError::AlreadyOwnsChannel => {
                "You already have a temporary voice channel.".to_string()
            }
            TempVcError::NotInVoiceChannel => "You're not in a voice channel.".to_string(),
            TempVcError::NotYourChannel(_) => "This isn't your temporary channel.".to_string(),
            TempVcError::TargetNotInChannel(user) => {
                format!("{} is not in this channel.", user.mention())
            }
            TempVcError::ProtectedTarget(_) => "The server owner cannot be kicked.".to_string(),
            TempVcError::Timeout(_) => "You took too long.".to_string(),
            TempVcError::Platform(_) | TempVcError::Storage(_) | TempVcError::Registry(_) => {
                "Something went wrong, please try again later.".to_string()
            }
        }
    }

    /// Whether running `/setup` again could fix the failure
    pub fn is_recoverable_by_setup(&self) -> bool {
        matches!(
            self,
            TempVcError::NotConfigured | TempVcError::MissingResource(_)
        )
    }
}
