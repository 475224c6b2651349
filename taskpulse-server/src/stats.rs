//! Count-by-status aggregation.
//!
//! Five separate count queries, one for the total and one per status. They
//! are not taken atomically: a write landing mid-aggregation can leave
//! `total` out of step with the per-status sum. Callers must treat the
//! result as a monitoring read, not a consistent snapshot.

use taskpulse_proto::task::{TaskStatistics, TaskStatus};

use crate::store::TaskStore;

/// Computes fresh statistics from `store`. Never cached.
pub async fn aggregate<S: TaskStore>(store: &S) -> TaskStatistics {
    let total = store.count().await;
    let pending = store.count_by_status(TaskStatus::Pending).await;
    let in_progress = store.count_by_status(TaskStatus::InProgress).await;
    let completed = store.count_by_status(TaskStatus::Completed).await;
    let cancelled = store.count_by_status(TaskStatus::Cancelled).await;

    TaskStatistics {
        total,
        pending,
        in_progress,
        completed,
        cancelled,
    }
}
