//! TempVC core: on-demand temporary voice channels
//!
//! See [`core_voice`] for the channel lifecycle and its platform boundary.

pub mod config;
pub mod core_voice;
pub mod logging;
pub mod shutdown;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{Config, ConfigError};
pub use core_voice::{BotEvent, TempVcBot, TempVcError, TempVcResult};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
