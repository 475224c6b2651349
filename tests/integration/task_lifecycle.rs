//! Integration tests for the task lifecycle through the service layer.
//!
//! Covers create, read, update, delete and statistics end to end against
//! the in-memory store, including the completion timestamp and telemetry
//! counters.

use taskpulse_proto::task::{TaskDraft, TaskPriority, TaskStatus, ValidationError};
use taskpulse_server::service::{TaskError, TaskService};
use taskpulse_server::store::InMemoryTaskStore;

fn service() -> TaskService<InMemoryTaskStore> {
    TaskService::new(InMemoryTaskStore::new())
}

#[tokio::test]
async fn design_doc_walkthrough() {
    let tasks = service();

    let created = tasks
        .create(TaskDraft::new("Write design doc").with_priority(TaskPriority::High))
        .await
        .unwrap();
    assert_eq!(created.status, TaskStatus::Pending);
    assert_eq!(created.priority, TaskPriority::High);
    assert!(created.updated_at.is_none());
    assert!(created.completed_at.is_none());

    let fetched = tasks.get(created.id).await.unwrap();
    assert_eq!(fetched, created);

    let started = tasks
        .update(
            created.id,
            TaskDraft::new("Write design doc")
                .with_priority(TaskPriority::High)
                .with_status(TaskStatus::InProgress),
        )
        .await
        .unwrap();
    assert_eq!(started.status, TaskStatus::InProgress);
    assert!(started.updated_at.is_some());
    assert!(started.completed_at.is_none());

    let done = tasks
        .update(
            created.id,
            TaskDraft::new("Write design doc")
                .with_description("v1 reviewed")
                .with_status(TaskStatus::Completed),
        )
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.priority, TaskPriority::Medium);
    assert_eq!(done.description.as_deref(), Some("v1 reviewed"));
    assert_eq!(done.created_at, created.created_at);
    let completed_at = done.completed_at.unwrap();
    assert!(completed_at >= created.created_at);

    // Re-saving as completed keeps the first completion time.
    let again = tasks
        .update(
            created.id,
            TaskDraft::new("Write design doc (final)").with_status(TaskStatus::Completed),
        )
        .await
        .unwrap();
    assert_eq!(again.completed_at, Some(completed_at));

    let stats = tasks.statistics().await;
    assert_eq!(stats.total, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 0);

    let counters = tasks.counters().snapshot();
    assert_eq!(counters.tasks_created_total, 1);
    assert_eq!(counters.tasks_completed_total, 1);

    tasks.delete(created.id).await.unwrap();
    assert_eq!(tasks.get(created.id).await, Err(TaskError::NotFound(created.id)));
    assert_eq!(tasks.delete(created.id).await, Err(TaskError::NotFound(created.id)));
    assert_eq!(tasks.statistics().await.total, 0);
}

#[tokio::test]
async fn statistics_count_every_status() {
    let tasks = service();
    let plan = [
        TaskStatus::Pending,
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
        TaskStatus::Cancelled,
        TaskStatus::Cancelled,
    ];
    for (n, status) in plan.iter().enumerate() {
        tasks
            .create(TaskDraft::new(format!("task {n}")).with_status(*status))
            .await
            .unwrap();
    }

    let stats = tasks.statistics().await;
    assert_eq!(stats.total, 7);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.cancelled, 3);
    assert_eq!(
        stats.pending + stats.in_progress + stats.completed + stats.cancelled,
        stats.total
    );
}

#[tokio::test]
async fn list_by_status_is_newest_first() {
    let tasks = service();
    let first = tasks
        .create(TaskDraft::new("first").with_status(TaskStatus::InProgress))
        .await
        .unwrap();
    tasks.create(TaskDraft::new("other")).await.unwrap();
    let second = tasks
        .create(TaskDraft::new("second").with_status(TaskStatus::InProgress))
        .await
        .unwrap();

    let in_progress = tasks.list_by_status(TaskStatus::InProgress).await;
    let ids: Vec<_> = in_progress.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert!(tasks.list_by_status(TaskStatus::Completed).await.is_empty());
}

#[tokio::test]
async fn invalid_drafts_change_nothing() {
    let tasks = service();
    let kept = tasks.create(TaskDraft::new("keep me")).await.unwrap();

    let err = tasks.create(TaskDraft::new("ab")).await.unwrap_err();
    assert_eq!(err, TaskError::Validation(ValidationError::TitleLength(2)));

    let err = tasks
        .update(kept.id, TaskDraft::new("   "))
        .await
        .unwrap_err();
    assert_eq!(err, TaskError::Validation(ValidationError::TitleBlank));

    let err = tasks
        .create(TaskDraft::new("fine title").with_description("x".repeat(501)))
        .await
        .unwrap_err();
    assert_eq!(err, TaskError::Validation(ValidationError::DescriptionTooLong(501)));

    assert_eq!(tasks.list().await, vec![kept.clone()]);
    assert_eq!(tasks.get(kept.id).await.unwrap().title, "keep me");
    assert_eq!(tasks.counters().snapshot().tasks_created_total, 1);
}

#[tokio::test]
async fn boundary_lengths_are_accepted() {
    let tasks = service();
    tasks.create(TaskDraft::new("abc")).await.unwrap();
    tasks.create(TaskDraft::new("t".repeat(100))).await.unwrap();
    tasks
        .create(TaskDraft::new("described").with_description("d".repeat(500)))
        .await
        .unwrap();
    assert_eq!(tasks.statistics().await.total, 3);
}

#[tokio::test]
async fn pending_creates_only_count_as_pending() {
    let tasks = service();
    assert_eq!(tasks.statistics().await, Default::default());

    let n = 6;
    for i in 0..n {
        tasks.create(TaskDraft::new(format!("pending {i}"))).await.unwrap();
    }

    let stats = tasks.statistics().await;
    assert_eq!(stats.total, n);
    assert_eq!(stats.pending, n);
    assert_eq!(stats.in_progress, 0);
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.cancelled, 0);
}

#[tokio::test]
async fn complete_one_then_add_two_more() {
    let tasks = service();

    let created = tasks
        .create(TaskDraft::new("Write design doc").with_priority(TaskPriority::Medium))
        .await
        .unwrap();
    assert_eq!(created.status, TaskStatus::Pending);
    assert_eq!(created.priority, TaskPriority::Medium);

    let completed = tasks
        .update(
            created.id,
            TaskDraft::new("Write design doc").with_status(TaskStatus::Completed),
        )
        .await
        .unwrap();
    assert_eq!(completed.id, created.id);
    assert!(completed.completed_at.unwrap() >= created.created_at);

    tasks.create(TaskDraft::new("Review design doc")).await.unwrap();
    tasks.create(TaskDraft::new("Publish design doc")).await.unwrap();

    let stats = tasks.statistics().await;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 2);
}
