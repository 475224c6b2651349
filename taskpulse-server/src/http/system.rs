//! Metrics, info and health endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use taskpulse_proto::metrics::MetricsSnapshot;

use super::{ApiError, AppState};
use crate::cache::CacheStats;
use crate::counters::CounterSnapshot;
use crate::store::TaskStore;

/// Body of `/api/v1/info`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoBody {
    /// Application name.
    pub name: String,
    /// Crate version.
    pub version: String,
    /// Deployment environment label.
    pub environment: String,
    /// Target operating system.
    pub os: &'static str,
    /// Target CPU architecture.
    pub arch: &'static str,
    /// When the response was built.
    pub timestamp: DateTime<Utc>,
}

/// Body of the health probes.
#[derive(Debug, Serialize)]
pub struct HealthBody {
    /// Always `"UP"` while the process serves requests.
    pub status: &'static str,
    /// When the probe was answered.
    pub timestamp: DateTime<Utc>,
}

/// Body of `/api/v1/metrics/tasks`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTelemetry {
    /// Created/completed totals and the operation timer, inlined.
    #[serde(flatten)]
    pub counters: CounterSnapshot,
    /// Read-through cache effectiveness.
    pub cache: CacheStats,
}

/// `GET /metrics/system`: one snapshot sampled on demand.
///
/// # Errors
///
/// 503 `METRICS_UNAVAILABLE` if sampling fails.
pub async fn system_metrics<S: TaskStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<MetricsSnapshot>, ApiError> {
    let source = Arc::clone(&state.metrics);
    let snapshot = tokio::task::spawn_blocking(move || source.sample())
        .await
        .map_err(|e| ApiError::Metrics(e.to_string()))??;
    Ok(Json(snapshot))
}

/// `GET /metrics/tasks`: task counters and cache stats.
pub async fn task_metrics<S: TaskStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<TaskTelemetry> {
    Json(TaskTelemetry {
        counters: state.tasks.counters().snapshot(),
        cache: state.tasks.cache_stats(),
    })
}

/// `GET /info`.
pub async fn info<S: TaskStore + 'static>(State(state): State<Arc<AppState<S>>>) -> Json<InfoBody> {
    Json(InfoBody {
        name: state.info.name.clone(),
        version: state.info.version.clone(),
        environment: state.info.environment.clone(),
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        timestamp: Utc::now(),
    })
}

/// `GET /health/live`.
pub async fn live() -> Json<HealthBody> {
    Json(HealthBody {
        status: "UP",
        timestamp: Utc::now(),
    })
}

/// `GET /health/ready`. Nothing gates readiness beyond being up.
pub async fn ready() -> Json<HealthBody> {
    Json(HealthBody {
        status: "UP",
        timestamp: Utc::now(),
    })
}
