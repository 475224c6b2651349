//! WebSocket topic sessions.
//!
//! One session per connection. The client subscribes to topics by name and
//! receives every message published on them while subscribed. Task commands
//! sent over the socket run through the same service as the REST API and
//! their outcome is published on [`topic::TASKS`] so every subscriber sees
//! it, not just the sender.
//!
//! Each session's outbound queue is bounded by [`OUTBOUND_CAPACITY`]. When a
//! client stops reading, the socket write stalls, the queue fills, and the
//! topic forwarders stop pulling from the hub. The hub's own bounded channel
//! then drops the oldest messages for that subscriber, which surface as a
//! logged lag once it catches up.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use taskpulse_proto::frame::{
    self, ClientFrame, PongReply, ServerFrame, TaskAction, TaskEvent,
};
use taskpulse_proto::task::{TaskDraft, TaskId};
use taskpulse_proto::topic;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::AppState;
use crate::service::TaskError;
use crate::store::TaskStore;

/// Frames queued per session before producers wait for the socket writer.
pub const OUTBOUND_CAPACITY: usize = 32;

/// axum handler that upgrades an HTTP request to a topic session.
pub async fn ws_handler<S: TaskStore + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drives one connection until either side closes it.
pub async fn handle_socket<S: TaskStore + 'static>(socket: WebSocket, state: Arc<AppState<S>>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(OUTBOUND_CAPACITY);

    tracing::info!("websocket session opened");

    let mut write_task = tokio::spawn(async move {
        while let Some(outgoing) = rx.recv().await {
            let text = match frame::encode_server(&outgoing) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unencodable frame");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                tracing::warn!("websocket write failed");
                break;
            }
        }
    });

    let mut read_task = tokio::spawn(async move {
        let mut session = Session::new(tx);
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => session.handle_text(text.as_str(), &state).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    tracing::info!("websocket session closed");
}

/// Per-connection subscription state. Dropping it cancels every forwarder.
struct Session {
    outbound: mpsc::Sender<ServerFrame>,
    subscriptions: HashMap<String, JoinHandle<()>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        for (_, forwarder) in self.subscriptions.drain() {
            forwarder.abort();
        }
    }
}

impl Session {
    fn new(outbound: mpsc::Sender<ServerFrame>) -> Self {
        Self {
            outbound,
            subscriptions: HashMap::new(),
        }
    }

    async fn send(&self, frame: ServerFrame) {
        // Err only means the writer is gone; the reader will stop next.
        let _ = self.outbound.send(frame).await;
    }

    async fn handle_text<S: TaskStore>(&mut self, text: &str, state: &AppState<S>) {
        match frame::decode_client(text) {
            Ok(ClientFrame::Subscribe { topic }) => self.subscribe(topic, state).await,
            Ok(ClientFrame::Unsubscribe { topic }) => self.unsubscribe(topic).await,
            Ok(ClientFrame::CreateTask { task }) => self.create_task(task, state).await,
            Ok(ClientFrame::UpdateTask { id, task }) => self.update_task(id, task, state).await,
            Ok(ClientFrame::Ping { payload }) => {
                self.publish(state, topic::PONG, &PongReply::new(payload))
                    .await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "undecodable client frame");
                self.send(ServerFrame::Error {
                    reason: e.to_string(),
                })
                .await;
            }
        }
    }

    async fn subscribe<S: Sync>(&mut self, topic: String, state: &AppState<S>) {
        if self.subscriptions.contains_key(&topic) {
            self.send(ServerFrame::Subscribed { topic }).await;
            return;
        }

        // Receiver exists before the ack is queued, so nothing published
        // after the client sees `subscribed` can be missed.
        let mut rx = state.hub.subscribe(&topic);
        self.send(ServerFrame::Subscribed {
            topic: topic.clone(),
        })
        .await;

        let out = self.outbound.clone();
        let forward_topic = topic.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(body) => {
                        let frame = ServerFrame::Message {
                            topic: forward_topic.clone(),
                            body: (*body).clone(),
                        };
                        // Waits while the queue is full; the hub keeps
                        // buffering up to its own capacity meanwhile.
                        if out.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %forward_topic, skipped, "subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        tracing::debug!(topic = %topic, "subscribed");
        self.subscriptions.insert(topic, forwarder);
    }

    async fn unsubscribe(&mut self, topic: String) {
        if let Some(forwarder) = self.subscriptions.remove(&topic) {
            forwarder.abort();
            tracing::debug!(topic = %topic, "unsubscribed");
        }
        self.send(ServerFrame::Unsubscribed { topic }).await;
    }

    async fn create_task<S: TaskStore>(&self, draft: TaskDraft, state: &AppState<S>) {
        let event = match state.tasks.create(draft).await {
            Ok(task) => TaskEvent::for_task(TaskAction::Created, task),
            Err(e) => TaskEvent::error(e.to_string()),
        };
        self.publish(state, topic::TASKS, &event).await;
    }

    async fn update_task<S: TaskStore>(&self, id: TaskId, draft: TaskDraft, state: &AppState<S>) {
        let event = match state.tasks.update(id, draft).await {
            Ok(task) => TaskEvent::for_task(TaskAction::Updated, task),
            Err(TaskError::NotFound(_)) => TaskEvent::error("Task not found"),
            Err(e) => TaskEvent::error(e.to_string()),
        };
        self.publish(state, topic::TASKS, &event).await;
    }

    async fn publish<S: Sync, T: serde::Serialize + Sync>(
        &self,
        state: &AppState<S>,
        topic: &str,
        body: &T,
    ) {
        let result = state.hub.publish_json(topic, body);
        if let Err(e) = result {
            tracing::warn!(error = %e, "publish from websocket failed");
            self.send(ServerFrame::Error {
                reason: e.to_string(),
            })
            .await;
        }
    }
}
