//! Integration tests for the REST API and the WebSocket topic protocol.
//!
//! REST tests drive the router in-process with `oneshot`; WebSocket tests
//! bind a real listener on `127.0.0.1:0` and connect with tungstenite.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use taskpulse_proto::frame::{self, ClientFrame, ServerFrame};
use taskpulse_proto::metrics::MetricsSnapshot;
use taskpulse_proto::task::{TaskDraft, TaskId, TaskStatus};
use taskpulse_proto::topic;
use taskpulse_server::broadcaster::MetricsBroadcaster;
use taskpulse_server::http::{self, AppInfo, AppState};
use taskpulse_server::metrics::{MetricsSource, RawCounters, SamplingError, build_snapshot};
use taskpulse_server::service::TaskService;
use taskpulse_server::store::InMemoryTaskStore;
use taskpulse_server::topics::TopicHub;
use tokio_tungstenite::tungstenite;
use tower::ServiceExt;

const WAIT: Duration = Duration::from_secs(5);

struct FixedSource;

impl MetricsSource for FixedSource {
    fn sample(&self) -> Result<MetricsSnapshot, SamplingError> {
        let raw = RawCounters {
            cpu_usage_percent: 12.5,
            used_memory_bytes: 2 * 1024 * 1024 * 1024,
            total_memory_bytes: 8 * 1024 * 1024 * 1024,
            free_memory_bytes: 6 * 1024 * 1024 * 1024,
            thread_count: 8,
            available_processors: 4,
            ..RawCounters::default()
        };
        Ok(build_snapshot(&raw, Some("api-test".into()), Utc::now()))
    }
}

struct BrokenSource;

impl MetricsSource for BrokenSource {
    fn sample(&self) -> Result<MetricsSnapshot, SamplingError> {
        Err(SamplingError::Source("probe unplugged".into()))
    }
}

fn state_with(source: Arc<dyn MetricsSource>) -> Arc<AppState<InMemoryTaskStore>> {
    state_with_hub(source, TopicHub::new())
}

fn state_with_hub(
    source: Arc<dyn MetricsSource>,
    hub: TopicHub,
) -> Arc<AppState<InMemoryTaskStore>> {
    Arc::new(AppState::new(
        TaskService::new(InMemoryTaskStore::new()),
        source,
        Arc::new(hub),
        AppInfo::default(),
    ))
}

fn app() -> Router {
    http::router(state_with(Arc::new(FixedSource)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// =============================================================================
// Tasks
// =============================================================================

#[tokio::test]
async fn create_then_fetch_round_trips_through_http() {
    let app = app();

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/tasks",
        Some(json!({"title": "Write design doc", "priority": "HIGH"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["priority"], "HIGH");
    assert!(created["createdAt"].is_string());
    assert!(created["updatedAt"].is_null());

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = send(&app, "GET", &format!("/api/v1/tasks/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, listed) = send(&app, "GET", "/api/v1/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([created]));
}

#[tokio::test]
async fn update_completes_and_delete_removes() {
    let app = app();
    let (_, created) = send(&app, "POST", "/api/v1/tasks", Some(json!({"title": "ship it"}))).await;
    let uri = format!("/api/v1/tasks/{}", created["id"].as_str().unwrap());

    let (status, updated) = send(
        &app,
        "PUT",
        &uri,
        Some(json!({"title": "ship it", "status": "COMPLETED", "description": "done"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "COMPLETED");
    assert!(updated["completedAt"].is_string());
    assert!(updated["updatedAt"].is_string());

    let (status, completed) = send(&app, "GET", "/api/v1/tasks/status/COMPLETED", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed.as_array().unwrap().len(), 1);

    let (status, body) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "TASK_NOT_FOUND");
}

#[tokio::test]
async fn validation_errors_are_400_with_field() {
    let app = app();

    let (status, body) = send(&app, "POST", "/api/v1/tasks", Some(json!({"title": "ab"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(body["field"], "title");

    let (status, body) = send(&app, "POST", "/api/v1/tasks", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "title");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/tasks",
        Some(json!({"title": "long notes", "description": "n".repeat(501)})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "description");

    let (_, listed) = send(&app, "GET", "/api/v1/tasks", None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn unknown_ids_are_404() {
    let app = app();
    let uri = format!("/api/v1/tasks/{}", TaskId::new());

    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "TASK_NOT_FOUND");

    let (status, _) = send(&app, "PUT", &uri, Some(json!({"title": "ghost"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_path_values_are_rejected() {
    let app = app();
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/v1/tasks/not-a-uuid").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/tasks/status/SOMEDAY")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn statistics_endpoint_counts_by_status() {
    let app = app();
    for (title, status) in [
        ("first", "PENDING"),
        ("second", "IN_PROGRESS"),
        ("third", "IN_PROGRESS"),
        ("fourth", "CANCELLED"),
    ] {
        let (code, _) = send(
            &app,
            "POST",
            "/api/v1/tasks",
            Some(json!({"title": title, "status": status})),
        )
        .await;
        assert_eq!(code, StatusCode::CREATED);
    }

    let (status, stats) = send(&app, "GET", "/api/v1/tasks/statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        stats,
        json!({"total": 4, "pending": 1, "inProgress": 2, "completed": 0, "cancelled": 1})
    );
}

// =============================================================================
// Metrics, info, health
// =============================================================================

#[tokio::test]
async fn system_metrics_returns_a_snapshot() {
    let (status, body) = send(&app(), "GET", "/api/v1/metrics/system", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hostname"], "api-test");
    assert_eq!(body["totalMemoryMB"], 8192);
    assert_eq!(body["usedMemoryMB"], 2048);
    assert_eq!(body["memoryUsagePercent"], 25.0);
    assert_eq!(body["availableProcessors"], 4);
}

#[tokio::test]
async fn system_metrics_failure_is_503() {
    let app = http::router(state_with(Arc::new(BrokenSource)));
    let (status, body) = send(&app, "GET", "/api/v1/metrics/system", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "METRICS_UNAVAILABLE");
}

#[tokio::test]
async fn task_metrics_report_counters_and_cache() {
    let app = app();
    let (_, created) = send(&app, "POST", "/api/v1/tasks", Some(json!({"title": "count me"}))).await;
    let uri = format!("/api/v1/tasks/{}", created["id"].as_str().unwrap());
    send(&app, "GET", &uri, None).await;
    send(&app, "GET", &uri, None).await;
    send(&app, "PUT", &uri, Some(json!({"title": "count me", "status": "COMPLETED"}))).await;

    let (status, body) = send(&app, "GET", "/api/v1/metrics/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasksCreatedTotal"], 1);
    assert_eq!(body["tasksCompletedTotal"], 1);
    assert_eq!(body["operationDuration"]["count"], 2);
    assert!(body["operationDuration"]["maxNanos"].is_u64());
    assert_eq!(body["cache"]["misses"], 1);
    assert_eq!(body["cache"]["hits"], 1);
    assert_eq!(body["cache"]["evictions"], 2);
}

#[tokio::test]
async fn info_and_health() {
    let app = app();

    let (status, info) = send(&app, "GET", "/api/v1/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["name"], "taskpulse");
    assert_eq!(info["environment"], "development");
    assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));

    for probe in ["/api/v1/health/live", "/api/v1/health/ready"] {
        let (status, body) = send(&app, "GET", probe, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UP");
    }
}

// =============================================================================
// WebSocket topics
// =============================================================================

type Client =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn start(state: Arc<AppState<InMemoryTaskStore>>) -> String {
    let (addr, _handle) = http::start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start server");
    format!("ws://{addr}/ws")
}

async fn connect(url: &str) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws
}

async fn ws_send(ws: &mut Client, frame: &ClientFrame) {
    let text = frame::encode_client(frame).unwrap();
    ws.send(tungstenite::Message::Text(text.into())).await.unwrap();
}

async fn ws_recv(ws: &mut Client) -> ServerFrame {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("recv timed out")
            .unwrap()
            .unwrap();
        if let tungstenite::Message::Text(text) = msg {
            return frame::decode_server(text.as_str()).unwrap();
        }
    }
}

async fn subscribe(ws: &mut Client, topic: &str) {
    ws_send(ws, &ClientFrame::Subscribe { topic: topic.to_string() }).await;
    assert_eq!(
        ws_recv(ws).await,
        ServerFrame::Subscribed { topic: topic.to_string() }
    );
}

async fn recv_body(ws: &mut Client, expected_topic: &str) -> Value {
    match ws_recv(ws).await {
        ServerFrame::Message { topic, body } => {
            assert_eq!(topic, expected_topic);
            body
        }
        other => panic!("expected a topic message, got {other:?}"),
    }
}

#[tokio::test]
async fn task_commands_are_published_to_every_subscriber() {
    let state = state_with(Arc::new(FixedSource));
    let url = start(state.clone()).await;

    let mut sender = connect(&url).await;
    let mut watcher = connect(&url).await;
    subscribe(&mut sender, topic::TASKS).await;
    subscribe(&mut watcher, topic::TASKS).await;

    ws_send(
        &mut sender,
        &ClientFrame::CreateTask {
            task: TaskDraft::new("from the socket"),
        },
    )
    .await;

    let seen_by_sender = recv_body(&mut sender, topic::TASKS).await;
    let seen_by_watcher = recv_body(&mut watcher, topic::TASKS).await;
    assert_eq!(seen_by_sender, seen_by_watcher);
    assert_eq!(seen_by_watcher["action"], "CREATED");
    assert_eq!(seen_by_watcher["task"]["title"], "from the socket");

    let id: TaskId = seen_by_watcher["task"]["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(state.tasks.get(id).await.unwrap().title, "from the socket");

    ws_send(
        &mut sender,
        &ClientFrame::UpdateTask {
            id,
            task: TaskDraft::new("from the socket").with_status(TaskStatus::InProgress),
        },
    )
    .await;
    let updated = recv_body(&mut watcher, topic::TASKS).await;
    assert_eq!(updated["action"], "UPDATED");
    assert_eq!(updated["task"]["status"], "IN_PROGRESS");
}

#[tokio::test]
async fn updating_an_unknown_task_publishes_an_error_event() {
    let url = start(state_with(Arc::new(FixedSource))).await;
    let mut ws = connect(&url).await;
    subscribe(&mut ws, topic::TASKS).await;

    ws_send(
        &mut ws,
        &ClientFrame::UpdateTask {
            id: TaskId::new(),
            task: TaskDraft::new("nobody home"),
        },
    )
    .await;
    let event = recv_body(&mut ws, topic::TASKS).await;
    assert_eq!(event["action"], "ERROR");
    assert_eq!(event["message"], "Task not found");
    assert!(event.get("task").is_none());

    ws_send(&mut ws, &ClientFrame::CreateTask { task: TaskDraft::new("x") }).await;
    let event = recv_body(&mut ws, topic::TASKS).await;
    assert_eq!(event["action"], "ERROR");
}

#[tokio::test]
async fn ping_is_answered_on_the_pong_topic() {
    let url = start(state_with(Arc::new(FixedSource))).await;
    let mut ws = connect(&url).await;
    subscribe(&mut ws, topic::PONG).await;

    ws_send(&mut ws, &ClientFrame::Ping { payload: json!({"seq": 7}) }).await;
    let pong = recv_body(&mut ws, topic::PONG).await;
    assert_eq!(pong["message"], "pong");
    assert_eq!(pong["received"], json!({"seq": 7}));
    assert!(pong["timestamp"].is_string());
}

#[tokio::test]
async fn unsubscribed_topics_stop_delivering() {
    let state = state_with(Arc::new(FixedSource));
    let url = start(state.clone()).await;
    let mut ws = connect(&url).await;
    subscribe(&mut ws, topic::PONG).await;

    ws_send(&mut ws, &ClientFrame::Unsubscribe { topic: topic::PONG.to_string() }).await;
    assert_eq!(
        ws_recv(&mut ws).await,
        ServerFrame::Unsubscribed { topic: topic::PONG.to_string() }
    );

    // Pings still publish, but this client no longer hears them. A fresh
    // subscription to another topic proves the connection is alive.
    ws_send(&mut ws, &ClientFrame::Ping { payload: Value::Null }).await;
    subscribe(&mut ws, topic::TASKS).await;
    state.hub.publish(topic::TASKS, json!("marker"));
    assert_eq!(recv_body(&mut ws, topic::TASKS).await, json!("marker"));
}

#[tokio::test]
async fn garbage_frames_get_an_error_reply() {
    let url = start(state_with(Arc::new(FixedSource))).await;
    let mut ws = connect(&url).await;

    ws.send(tungstenite::Message::Text("{not json".to_string().into())).await.unwrap();
    assert!(matches!(ws_recv(&mut ws).await, ServerFrame::Error { .. }));

    // The session survives.
    subscribe(&mut ws, topic::TASKS).await;
}

#[tokio::test]
async fn metrics_reach_websocket_subscribers() {
    let state = state_with(Arc::new(FixedSource));
    let broadcaster =
        MetricsBroadcaster::new(Arc::new(FixedSource), state.hub.clone())
            .with_interval(Duration::from_millis(25))
            .spawn();
    let url = start(state).await;

    let mut ws = connect(&url).await;
    subscribe(&mut ws, topic::METRICS).await;

    let snapshot = recv_body(&mut ws, topic::METRICS).await;
    assert_eq!(snapshot["hostname"], "api-test");
    assert_eq!(snapshot["cpuUsagePercent"], 12.5);
    assert_eq!(snapshot["activeThreadCount"], 8);

    broadcaster.stop().await;
}

#[tokio::test]
async fn stalled_client_skips_instead_of_buffering_everything() {
    const BULK: &str = "/topic/bulk";
    let state = state_with_hub(Arc::new(FixedSource), TopicHub::with_capacity(4));
    let url = start(state.clone()).await;
    let mut ws = connect(&url).await;
    subscribe(&mut ws, BULK).await;

    // The client reads nothing while roughly 50 MiB is published.
    let pad = "x".repeat(256 * 1024);
    let published: u64 = 200;
    for n in 0..published {
        state.hub.publish(BULK, json!({"n": n, "pad": pad.as_str()}));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let mut received: u64 = 0;
    loop {
        let body = recv_body(&mut ws, BULK).await;
        received += 1;
        if body["n"] == published - 1 {
            break;
        }
    }
    assert!(
        received < published,
        "server queued all {received} messages for a stalled client"
    );
}
