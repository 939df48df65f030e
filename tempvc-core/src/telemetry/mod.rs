//! Metrics for temporary channel activity
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding application installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

pub const CHANNELS_CREATED: &str = "tempvc.channels.created";
pub const CHANNELS_DELETED: &str = "tempvc.channels.deleted";
pub const CHANNELS_ACTIVE: &str = "tempvc.channels.active";
pub const CREATIONS_REJECTED: &str = "tempvc.creations.rejected";
pub const DELETIONS_ABORTED: &str = "tempvc.deletions.aborted";
pub const SESSIONS_STARTED: &str = "tempvc.sessions.started";
pub const SESSIONS_EXPIRED: &str = "tempvc.sessions.expired";
pub const COMMAND_DURATION_MS: &str = "tempvc.command.duration_ms";

/// Register metric descriptions with the installed recorder
pub fn init_metrics() {
    describe_counter!(CHANNELS_CREATED, "Temporary channels provisioned");
    describe_counter!(CHANNELS_DELETED, "Temporary channels deleted after going idle");
    describe_gauge!(CHANNELS_ACTIVE, "Temporary channels currently registered");
    describe_counter!(CREATIONS_REJECTED, "Creation attempts rejected by a precondition");
    describe_counter!(DELETIONS_ABORTED, "Pending deletions cancelled by a rejoin");
    describe_counter!(SESSIONS_STARTED, "Owner control sessions started");
    describe_counter!(SESSIONS_EXPIRED, "Owner control sessions ended by inactivity");
    describe_histogram!(COMMAND_DURATION_MS, "Command handling duration in milliseconds");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a gauge metric
pub fn record_gauge(name: &'static str, value: f64) {
    gauge!(name).set(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    command: &'static str,
    start: Instant,
}

impl Timer {
    /// Start timing a command
    pub fn command(command: &'static str) -> Self {
        Self {
            name: COMMAND_DURATION_MS,
            command,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name, "command" => self.command).record(duration.as_secs_f64() * 1000.0);
    }
}
