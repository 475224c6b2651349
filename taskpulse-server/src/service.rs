//! Cache-aware task operations.
//!
//! [`TaskService`] is the only way callers reach the store. Reads of a
//! single task or the full list go through the [`TaskCache`]; every
//! successful write evicts the whole cache before returning, so the next
//! read always reflects it. Status-filtered listings and statistics bypass
//! the cache entirely.

use std::sync::Arc;
use std::time::Instant;

use taskpulse_proto::task::{Task, TaskDraft, TaskId, TaskStatistics, TaskStatus, ValidationError};
use thiserror::Error;

use crate::cache::{CacheStats, TaskCache};
use crate::counters::TaskCounters;
use crate::stats;
use crate::store::TaskStore;

/// Errors that can occur during task operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The submitted fields break a task rule.
    #[error("invalid {}: {}", .0.field(), .0)]
    Validation(#[from] ValidationError),
    /// No task has the given id.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

/// Task operations over a store, with a read-through cache in front.
pub struct TaskService<S> {
    store: S,
    cache: TaskCache,
    counters: Arc<TaskCounters>,
}

impl<S: TaskStore> TaskService<S> {
    /// Creates a service over `store` with fresh counters.
    pub fn new(store: S) -> Self {
        Self::with_counters(store, Arc::new(TaskCounters::new()))
    }

    /// Creates a service over `store` that reports into `counters`.
    pub fn with_counters(store: S, counters: Arc<TaskCounters>) -> Self {
        Self {
            store,
            cache: TaskCache::new(),
            counters,
        }
    }

    /// Validates and stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Validation`] if the draft breaks a field rule;
    /// nothing is stored and the cache is left alone.
    pub async fn create(&self, draft: TaskDraft) -> Result<Task, TaskError> {
        let started = Instant::now();
        let result = self.create_untimed(draft).await;
        self.counters.record_operation(started.elapsed());
        result
    }

    async fn create_untimed(&self, draft: TaskDraft) -> Result<Task, TaskError> {
        draft.validate()?;

        let task = self.store.insert(draft).await;
        self.cache.invalidate_all();

        self.counters.record_created();
        if task.status == TaskStatus::Completed {
            self.counters.record_completed();
        }
        tracing::info!(task_id = %task.id, title = %task.title, "task created");
        Ok(task)
    }

    /// Returns a single task, from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if the id is absent.
    pub async fn get(&self, id: TaskId) -> Result<Task, TaskError> {
        if let Some(task) = self.cache.get(id) {
            tracing::debug!(task_id = %id, "task cache hit");
            return Ok(task);
        }

        let generation = self.cache.generation();
        tracing::debug!(task_id = %id, "task cache miss, reading store");
        let task = self.store.get(id).await.ok_or(TaskError::NotFound(id))?;
        self.cache.put(generation, task.clone());
        Ok(task)
    }

    /// Returns every task newest first, from the cache when possible.
    pub async fn list(&self) -> Vec<Task> {
        if let Some(tasks) = self.cache.list() {
            tracing::debug!(count = tasks.len(), "task list cache hit");
            return tasks;
        }

        let generation = self.cache.generation();
        tracing::debug!("task list cache miss, reading store");
        let tasks = self.store.list().await;
        self.cache.put_list(generation, tasks.clone());
        tasks
    }

    /// Returns every task with `status`, newest first. Not cached.
    pub async fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.store.list_by_status(status).await
    }

    /// Replaces a task's editable fields.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Validation`] if the draft breaks a field rule,
    /// or [`TaskError::NotFound`] if the id is absent. Neither evicts.
    pub async fn update(&self, id: TaskId, draft: TaskDraft) -> Result<Task, TaskError> {
        let started = Instant::now();
        let result = self.update_untimed(id, draft).await;
        self.counters.record_operation(started.elapsed());
        result
    }

    async fn update_untimed(&self, id: TaskId, draft: TaskDraft) -> Result<Task, TaskError> {
        draft.validate()?;

        let updated = self
            .store
            .update(id, draft)
            .await
            .ok_or(TaskError::NotFound(id))?;
        self.cache.invalidate_all();

        if updated.completed_now() {
            self.counters.record_completed();
        }
        tracing::info!(
            task_id = %id,
            from = %updated.previous_status,
            to = %updated.task.status,
            "task updated"
        );
        Ok(updated.task)
    }

    /// Permanently removes a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if the id is absent, including on
    /// every repeat delete of an id that was already removed.
    pub async fn delete(&self, id: TaskId) -> Result<(), TaskError> {
        if !self.store.remove(id).await {
            return Err(TaskError::NotFound(id));
        }
        self.cache.invalidate_all();
        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Fresh count-by-status summary; see [`stats::aggregate`].
    pub async fn statistics(&self) -> TaskStatistics {
        stats::aggregate(&self.store).await
    }

    /// The telemetry counters this service reports into.
    #[must_use]
    pub const fn counters(&self) -> &Arc<TaskCounters> {
        &self.counters
    }

    /// Cache hit/miss/eviction counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }
}
