//! Broadcast topic names.

/// Periodic [`MetricsSnapshot`](crate::metrics::MetricsSnapshot) pushes.
pub const METRICS: &str = "/topic/metrics";

/// Task change events produced by WebSocket task commands.
pub const TASKS: &str = "/topic/tasks";

/// Replies to WebSocket `ping` frames.
pub const PONG: &str = "/topic/pong";
