//! Test utilities and helpers for TempVC
//!
//! Async helpers for timer-driven code and a [`GuildFixture`] that stands up
//! a configured guild on the in-memory platform with a running bot.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
