//! `/api/v1/tasks` handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use taskpulse_proto::task::{Task, TaskDraft, TaskId, TaskStatistics, TaskStatus};
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::store::TaskStore;

type Shared<S> = State<Arc<AppState<S>>>;

/// `GET /tasks`: every task, newest first.
pub async fn list<S: TaskStore + 'static>(State(state): Shared<S>) -> Json<Vec<Task>> {
    tracing::debug!("listing tasks");
    Json(state.tasks.list().await)
}

/// `GET /tasks/{id}`.
///
/// # Errors
///
/// 404 `TASK_NOT_FOUND` if no task has this id.
pub async fn get<S: TaskStore + 'static>(
    State(state): Shared<S>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let task = state.tasks.get(TaskId::from_uuid(id)).await?;
    Ok(Json(task))
}

/// `POST /tasks`: stores a new task and answers 201 with it.
///
/// # Errors
///
/// 400 `VALIDATION_ERROR` naming the offending field.
pub async fn create<S: TaskStore + 'static>(
    State(state): Shared<S>,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = state.tasks.create(draft).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /tasks/{id}`: replaces every editable field.
///
/// # Errors
///
/// 400 `VALIDATION_ERROR` for a bad draft, 404 `TASK_NOT_FOUND` for an
/// unknown id.
pub async fn update<S: TaskStore + 'static>(
    State(state): Shared<S>,
    Path(id): Path<Uuid>,
    Json(draft): Json<TaskDraft>,
) -> Result<Json<Task>, ApiError> {
    let task = state.tasks.update(TaskId::from_uuid(id), draft).await?;
    Ok(Json(task))
}

/// `DELETE /tasks/{id}`: answers 204 on success.
///
/// # Errors
///
/// 404 `TASK_NOT_FOUND` if the id is absent, including on repeat deletes.
pub async fn delete<S: TaskStore + 'static>(
    State(state): Shared<S>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.tasks.delete(TaskId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /tasks/status/{status}`: tasks in one status, newest first.
pub async fn list_by_status<S: TaskStore + 'static>(
    State(state): Shared<S>,
    Path(status): Path<TaskStatus>,
) -> Json<Vec<Task>> {
    tracing::debug!(%status, "listing tasks by status");
    Json(state.tasks.list_by_status(status).await)
}

/// `GET /tasks/statistics`: fresh count-by-status summary.
pub async fn statistics<S: TaskStore + 'static>(State(state): Shared<S>) -> Json<TaskStatistics> {
    Json(state.tasks.statistics().await)
}
