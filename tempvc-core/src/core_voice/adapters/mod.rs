//! Platform adapters

pub mod in_memory;

pub use in_memory::{ChannelKind, ChannelSnapshot, DmMessage, InMemoryPlatform};
