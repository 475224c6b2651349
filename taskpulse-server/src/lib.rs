//! `taskpulse` server library.
//!
//! A task store behind a whole-cache-eviction read-through cache, task
//! statistics, host and process metrics sampling, and a periodic broadcaster
//! that pushes metrics snapshots to WebSocket subscribers. Exposed as a
//! library for use in tests and embedding.

pub mod broadcaster;
pub mod cache;
pub mod config;
pub mod counters;
pub mod http;
pub mod metrics;
pub mod service;
pub mod stats;
pub mod store;
pub mod topics;
