//! Shared data and wire definitions for taskpulse.
//!
//! Everything here is plain data: task records and their validation rules,
//! derived statistics, metric snapshots, and the JSON frames exchanged over
//! the WebSocket endpoint.

pub mod frame;
pub mod metrics;
pub mod task;
pub mod topic;
