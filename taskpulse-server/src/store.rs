//! Task persistence.
//!
//! [`TaskStore`] is the seam to whatever holds task records; the rest of the
//! crate only talks to it through the cache-aware
//! [`TaskService`](crate::service::TaskService). [`InMemoryTaskStore`] is the
//! shipped implementation.
//!
//! The store owns identity and timestamps: it assigns ids, sets
//! `created_at` once, refreshes `updated_at` on every update, and stamps
//! `completed_at` the first time a task is completed.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use taskpulse_proto::task::{Task, TaskDraft, TaskId, TaskStatus};
use tokio::sync::RwLock;

/// Result of a successful [`TaskStore::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedTask {
    /// The record after the update.
    pub task: Task,
    /// Status the record had before the update.
    pub previous_status: TaskStatus,
}

impl UpdatedTask {
    /// Whether this update moved the task into `Completed`.
    #[must_use]
    pub fn completed_now(&self) -> bool {
        self.previous_status != TaskStatus::Completed && self.task.status == TaskStatus::Completed
    }
}

/// Async storage trait for task records.
///
/// Implementations provide single-record atomicity only; nothing here spans
/// more than one record. Drafts reaching the store have already been
/// validated.
///
/// Listing methods return records newest first (`created_at` descending,
/// ties broken by id descending).
pub trait TaskStore: Send + Sync {
    /// Persists a new record built from `draft` and returns it.
    fn insert(&self, draft: TaskDraft) -> impl Future<Output = Task> + Send;

    /// Returns the record with the given id, if present.
    fn get(&self, id: TaskId) -> impl Future<Output = Option<Task>> + Send;

    /// Returns every record, newest first.
    fn list(&self) -> impl Future<Output = Vec<Task>> + Send;

    /// Returns every record with the given status, newest first.
    fn list_by_status(&self, status: TaskStatus) -> impl Future<Output = Vec<Task>> + Send;

    /// Replaces the editable fields of a record. `None` if the id is absent.
    fn update(
        &self,
        id: TaskId,
        draft: TaskDraft,
    ) -> impl Future<Output = Option<UpdatedTask>> + Send;

    /// Removes a record permanently. Returns `false` if the id was absent.
    fn remove(&self, id: TaskId) -> impl Future<Output = bool> + Send;

    /// Number of records.
    fn count(&self) -> impl Future<Output = u64> + Send;

    /// Number of records with the given status.
    fn count_by_status(&self, status: TaskStatus) -> impl Future<Output = u64> + Send;
}

/// Builds a fresh record from a draft.
///
/// A draft that is already `Completed` is stamped as completed at creation.
#[must_use]
pub fn new_record(id: TaskId, draft: TaskDraft, now: DateTime<Utc>) -> Task {
    let completed_at = (draft.status == TaskStatus::Completed).then_some(now);
    Task {
        id,
        title: draft.title,
        description: draft.description,
        status: draft.status,
        priority: draft.priority,
        created_at: now,
        updated_at: None,
        completed_at,
    }
}

/// Replaces the editable fields of `task` with `draft`.
///
/// Returns the status the task had before. `completed_at` is only ever set,
/// never cleared.
pub fn apply_draft(task: &mut Task, draft: TaskDraft, now: DateTime<Utc>) -> TaskStatus {
    let previous = task.status;
    task.title = draft.title;
    task.description = draft.description;
    task.status = draft.status;
    task.priority = draft.priority;
    task.updated_at = Some(now);
    if task.status == TaskStatus::Completed && task.completed_at.is_none() {
        task.completed_at = Some(now);
    }
    previous
}

/// Newest-first ordering used by every listing.
fn newest_first(a: &Task, b: &Task) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Counts as `u64`; record counts always fit.
#[allow(clippy::cast_possible_truncation)]
const fn as_count(n: usize) -> u64 {
    n as u64
}

/// In-memory task store.
///
/// Thread-safe via [`RwLock`]. Records live for the lifetime of the process.
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    async fn collect_sorted(&self, filter: impl Fn(&Task) -> bool + Send) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut out: Vec<Task> = tasks.values().filter(|t| filter(t)).cloned().collect();
        drop(tasks);
        out.sort_by(newest_first);
        out
    }
}

impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, draft: TaskDraft) -> Task {
        let task = new_record(TaskId::new(), draft, Utc::now());
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task.clone());
        drop(tasks);
        task
    }

    async fn get(&self, id: TaskId) -> Option<Task> {
        let tasks = self.tasks.read().await;
        tasks.get(&id).cloned()
    }

    async fn list(&self) -> Vec<Task> {
        self.collect_sorted(|_| true).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.collect_sorted(|t| t.status == status).await
    }

    async fn update(&self, id: TaskId, draft: TaskDraft) -> Option<UpdatedTask> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id)?;
        let previous_status = apply_draft(task, draft, Utc::now());
        let task = task.clone();
        drop(tasks);
        Some(UpdatedTask {
            task,
            previous_status,
        })
    }

    async fn remove(&self, id: TaskId) -> bool {
        let mut tasks = self.tasks.write().await;
        tasks.remove(&id).is_some()
    }

    async fn count(&self) -> u64 {
        let tasks = self.tasks.read().await;
        as_count(tasks.len())
    }

    async fn count_by_status(&self, status: TaskStatus) -> u64 {
        let tasks = self.tasks.read().await;
        as_count(tasks.values().filter(|t| t.status == status).count())
    }
}
