//! Host resource snapshot pushed on the metrics topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resource usage at one instant.
///
/// Memory figures are whole megabytes; percentages carry two decimals.
/// The `heap*` fields describe this process's resident memory against its
/// configured ceiling (or total host memory when no ceiling is set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Host CPU load, never negative.
    pub cpu_usage_percent: f64,
    /// Host memory in use.
    #[serde(rename = "usedMemoryMB")]
    pub used_memory_mb: u64,
    /// Host memory installed.
    #[serde(rename = "totalMemoryMB")]
    pub total_memory_mb: u64,
    /// Host memory free.
    #[serde(rename = "freeMemoryMB")]
    pub free_memory_mb: u64,
    /// `used / total`, as a percentage.
    pub memory_usage_percent: f64,
    /// Threads in this process.
    pub active_thread_count: u32,
    /// Seconds since this process started.
    pub uptime_seconds: u64,
    /// Host name, or `"unknown"` when it cannot be resolved.
    pub hostname: String,
    /// Logical CPUs visible to the process.
    pub available_processors: u32,
    /// Resident memory of this process.
    #[serde(rename = "heapUsedMB")]
    pub heap_used_mb: u64,
    /// Memory ceiling for this process.
    #[serde(rename = "heapMaxMB")]
    pub heap_max_mb: u64,
    /// `heap_used / heap_max`, as a percentage; 0 when the ceiling is 0.
    pub heap_usage_percent: f64,
}
