//! HTTP and WebSocket surface.
//!
//! REST resources live under `/api/v1`; the topic protocol is served on
//! `/ws`. All handlers share one [`AppState`].

pub mod error;
pub mod system;
pub mod tasks;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::MetricsSource;
use crate::service::TaskService;
use crate::store::TaskStore;
use crate::topics::TopicHub;

pub use error::ApiError;

/// Static application identity reported by `/api/v1/info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Application name.
    pub name: String,
    /// Build version.
    pub version: String,
    /// Deployment environment label.
    pub environment: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "taskpulse".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Everything a request handler can reach.
pub struct AppState<S> {
    /// Task operations.
    pub tasks: TaskService<S>,
    /// On-demand metrics.
    pub metrics: Arc<dyn MetricsSource>,
    /// Topic fan-out shared with the broadcaster.
    pub hub: Arc<TopicHub>,
    /// Identity for the info endpoint.
    pub info: AppInfo,
}

impl<S: TaskStore> AppState<S> {
    /// Bundles the shared components.
    pub fn new(
        tasks: TaskService<S>,
        metrics: Arc<dyn MetricsSource>,
        hub: Arc<TopicHub>,
        info: AppInfo,
    ) -> Self {
        Self {
            tasks,
            metrics,
            hub,
            info,
        }
    }
}

/// Builds the full router: `/api/v1/*` plus `/ws`.
pub fn router<S: TaskStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let api = Router::new()
        .route("/tasks", get(tasks::list::<S>).post(tasks::create::<S>))
        .route("/tasks/statistics", get(tasks::statistics::<S>))
        .route("/tasks/status/{status}", get(tasks::list_by_status::<S>))
        .route(
            "/tasks/{id}",
            get(tasks::get::<S>)
                .put(tasks::update::<S>)
                .delete(tasks::delete::<S>),
        )
        .route("/metrics/system", get(system::system_metrics::<S>))
        .route("/metrics/tasks", get(system::task_metrics::<S>))
        .route("/info", get(system::info::<S>))
        .route("/health/live", get(system::live))
        .route("/health/ready", get(system::ready));

    Router::new()
        .nest("/api/v1", api)
        .route("/ws", get(ws::ws_handler::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves [`router`] in the background, returning the bound
/// address and the server task.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state<S: TaskStore + 'static>(
    addr: &str,
    state: Arc<AppState<S>>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}
