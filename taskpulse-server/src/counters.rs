//! Process-lifetime task telemetry counters.
//!
//! Two event counters plus a timer over create and update calls. The timer
//! keeps count, total and maximum in nanoseconds; the mean is derived on
//! read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Monotonic counters for task activity.
///
/// Increment is the only mutation. Shared via `Arc` between the service
/// that bumps them and whatever reports them.
#[derive(Debug, Default)]
pub struct TaskCounters {
    created: AtomicU64,
    completed: AtomicU64,
    timed: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

/// Point-in-time copy of the operation timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationSnapshot {
    /// Operations timed.
    pub count: u64,
    /// Sum of all recorded durations.
    pub total_nanos: u64,
    /// Longest recorded duration.
    pub max_nanos: u64,
    /// `total_nanos / count`, 0 when nothing was timed.
    pub mean_nanos: u64,
}

/// Point-in-time copy of [`TaskCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    /// Tasks created since startup.
    pub tasks_created_total: u64,
    /// Transitions into `Completed` since startup.
    pub tasks_completed_total: u64,
    /// Time spent in create and update calls, failed ones included.
    pub operation_duration: DurationSnapshot,
}

impl TaskCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one created task.
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one transition into `Completed`.
    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records how long one create or update took.
    pub fn record_operation(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.timed.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    /// Reads every counter.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let count = self.timed.load(Ordering::Relaxed);
        let total_nanos = self.total_nanos.load(Ordering::Relaxed);
        CounterSnapshot {
            tasks_created_total: self.created.load(Ordering::Relaxed),
            tasks_completed_total: self.completed.load(Ordering::Relaxed),
            operation_duration: DurationSnapshot {
                count,
                total_nanos,
                max_nanos: self.max_nanos.load(Ordering::Relaxed),
                mean_nanos: total_nanos.checked_div(count).unwrap_or(0),
            },
        }
    }
}
