//! Host and process resource sampling.
//!
//! [`SystemMetricsCollector`] reads live counters through `sysinfo` and
//! turns them into a [`MetricsSnapshot`]. The conversion itself lives in
//! [`build_snapshot`], a pure function over [`RawCounters`]:
//!
//! - CPU readings below zero (or NaN) are floored to 0.
//! - Percentages are rounded to two decimals.
//! - Byte counts become whole megabytes by truncating division.
//! - A missing hostname becomes `"unknown"`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sysinfo::{Pid, System};
use taskpulse_proto::metrics::MetricsSnapshot;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Substitute for a hostname that cannot be resolved.
pub const UNKNOWN_HOSTNAME: &str = "unknown";

/// Errors that can occur while sampling.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    /// The sampler could not determine its own process id.
    #[error("cannot determine current process id: {0}")]
    ProcessId(String),
    /// The process table no longer lists this process.
    #[error("process {0} is not visible to the sampler")]
    ProcessNotFound(Pid),
    /// A source-specific failure.
    #[error("sampling failed: {0}")]
    Source(String),
}

/// Anything that can produce a [`MetricsSnapshot`] on demand.
pub trait MetricsSource: Send + Sync {
    /// Reads the current counters.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError`] if the counters cannot be read.
    fn sample(&self) -> Result<MetricsSnapshot, SamplingError>;
}

/// Counters as read from the host, before unit conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawCounters {
    /// Host CPU load in percent, possibly negative or NaN.
    pub cpu_usage_percent: f64,
    /// Host memory in use, bytes.
    pub used_memory_bytes: u64,
    /// Host memory installed, bytes.
    pub total_memory_bytes: u64,
    /// Host memory free, bytes.
    pub free_memory_bytes: u64,
    /// Resident memory of this process, bytes.
    pub process_memory_bytes: u64,
    /// Memory ceiling for this process, bytes.
    pub process_memory_limit_bytes: u64,
    /// Threads in this process.
    pub thread_count: u32,
    /// Seconds since this process started.
    pub uptime_seconds: u64,
    /// Logical CPUs.
    pub available_processors: u32,
}

/// Rounds to two decimal places, half away from zero.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Converts raw counters into a snapshot.
#[must_use]
pub fn build_snapshot(
    raw: &RawCounters,
    hostname: Option<String>,
    timestamp: DateTime<Utc>,
) -> MetricsSnapshot {
    let cpu = if raw.cpu_usage_percent.is_nan() || raw.cpu_usage_percent < 0.0 {
        0.0
    } else {
        raw.cpu_usage_percent
    };

    MetricsSnapshot {
        timestamp,
        cpu_usage_percent: round2(cpu),
        used_memory_mb: raw.used_memory_bytes / BYTES_PER_MB,
        total_memory_mb: raw.total_memory_bytes / BYTES_PER_MB,
        free_memory_mb: raw.free_memory_bytes / BYTES_PER_MB,
        memory_usage_percent: percent(raw.used_memory_bytes, raw.total_memory_bytes),
        active_thread_count: raw.thread_count,
        uptime_seconds: raw.uptime_seconds,
        hostname: hostname.unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string()),
        available_processors: raw.available_processors,
        heap_used_mb: raw.process_memory_bytes / BYTES_PER_MB,
        heap_max_mb: raw.process_memory_limit_bytes / BYTES_PER_MB,
        heap_usage_percent: percent(
            raw.process_memory_bytes,
            raw.process_memory_limit_bytes,
        ),
    }
}

/// `sysinfo`-backed sampler for this process and its host.
///
/// The `sysinfo` handle is refreshed in place on each sample, so CPU load is
/// measured between consecutive samples. The very first reading after
/// startup is therefore 0.
pub struct SystemMetricsCollector {
    system: Mutex<System>,
    pid: Pid,
    memory_limit_bytes: Option<u64>,
}

impl SystemMetricsCollector {
    /// Creates a collector for the current process.
    ///
    /// `memory_limit_mb` is reported as the process memory ceiling; when
    /// `None`, total host memory is used instead.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::ProcessId`] if the current pid is unknown.
    pub fn new(memory_limit_mb: Option<u64>) -> Result<Self, SamplingError> {
        let pid =
            sysinfo::get_current_pid().map_err(|e| SamplingError::ProcessId(e.to_string()))?;
        let mut system = System::new();
        // Prime the CPU baseline so the next refresh has something to diff against.
        system.refresh_cpu();
        Ok(Self {
            system: Mutex::new(system),
            pid,
            memory_limit_bytes: memory_limit_mb.map(|mb| mb.saturating_mul(BYTES_PER_MB)),
        })
    }

    fn read_counters(&self) -> Result<RawCounters, SamplingError> {
        let mut system = self.system.lock();
        system.refresh_cpu();
        system.refresh_memory();
        if !system.refresh_process(self.pid) {
            return Err(SamplingError::ProcessNotFound(self.pid));
        }
        let process = system
            .process(self.pid)
            .ok_or(SamplingError::ProcessNotFound(self.pid))?;

        let thread_count = process
            .tasks()
            .map_or(1, |tasks| u32::try_from(tasks.len()).unwrap_or(u32::MAX));
        let total_memory = system.total_memory();

        Ok(RawCounters {
            cpu_usage_percent: f64::from(system.global_cpu_info().cpu_usage()),
            used_memory_bytes: system.used_memory(),
            total_memory_bytes: total_memory,
            free_memory_bytes: system.free_memory(),
            process_memory_bytes: process.memory(),
            process_memory_limit_bytes: self.memory_limit_bytes.unwrap_or(total_memory),
            thread_count: thread_count.max(1),
            uptime_seconds: process.run_time(),
            available_processors: u32::try_from(system.cpus().len()).unwrap_or(u32::MAX),
        })
    }
}

impl MetricsSource for SystemMetricsCollector {
    fn sample(&self) -> Result<MetricsSnapshot, SamplingError> {
        let raw = self.read_counters()?;
        Ok(build_snapshot(&raw, System::host_name(), Utc::now()))
    }
}
