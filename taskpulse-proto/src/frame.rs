//! WebSocket frame types and their JSON codec.
//!
//! Frames are JSON text messages tagged by a `type` field. A client first
//! subscribes to one or more topics, then receives every message published
//! on them as [`ServerFrame::Message`]. Clients may also submit task
//! commands; their results are published on [`crate::topic::TASKS`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskDraft, TaskId};

/// Error type for frame encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value could not be written as JSON.
    #[error("frame encode error: {0}")]
    Encode(serde_json::Error),
    /// The text is not a valid frame.
    #[error("frame decode error: {0}")]
    Decode(serde_json::Error),
}

/// Frames sent by a WebSocket client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    /// Start receiving messages published on `topic`.
    Subscribe {
        /// Topic name, e.g. `/topic/metrics`.
        topic: String,
    },
    /// Stop receiving messages published on `topic`.
    Unsubscribe {
        /// Topic name.
        topic: String,
    },
    /// Create a task; the outcome is published on the tasks topic.
    CreateTask {
        /// Fields of the new task.
        task: TaskDraft,
    },
    /// Replace a task's fields; the outcome is published on the tasks topic.
    UpdateTask {
        /// Task to update.
        id: TaskId,
        /// Replacement fields.
        task: TaskDraft,
    },
    /// Liveness probe; answered on the pong topic.
    Ping {
        /// Arbitrary JSON echoed back in the reply.
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    /// Subscription to `topic` is active.
    Subscribed {
        /// Topic name.
        topic: String,
    },
    /// Subscription to `topic` was removed.
    Unsubscribed {
        /// Topic name.
        topic: String,
    },
    /// A message published on a subscribed topic.
    Message {
        /// Topic the message was published on.
        topic: String,
        /// Message body as published.
        body: serde_json::Value,
    },
    /// The previous client frame could not be handled.
    Error {
        /// Human-readable description.
        reason: String,
    },
}

/// What happened to a task in a [`TaskEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    /// A task was created.
    Created,
    /// A task was updated.
    Updated,
    /// The command failed; see `message`.
    Error,
}

/// Body published on the tasks topic after a WebSocket task command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Outcome of the command.
    pub action: TaskAction,
    /// The resulting record, absent on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    /// Failure description, present on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    /// Event for a successfully created or updated task.
    #[must_use]
    pub fn for_task(action: TaskAction, task: Task) -> Self {
        Self {
            action,
            task: Some(task),
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// Event for a failed task command.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            action: TaskAction::Error,
            task: None,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Body published on the pong topic in reply to a ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongReply {
    /// Always `"pong"`.
    pub message: String,
    /// The ping's payload.
    pub received: serde_json::Value,
    /// When the reply was produced.
    pub timestamp: DateTime<Utc>,
}

impl PongReply {
    /// Builds the reply to a ping carrying `received`.
    #[must_use]
    pub fn new(received: serde_json::Value) -> Self {
        Self {
            message: "pong".to_string(),
            received,
            timestamp: Utc::now(),
        }
    }
}

/// Encodes a [`ClientFrame`] as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_client(frame: &ClientFrame) -> Result<String, CodecError> {
    serde_json::to_string(frame).map_err(CodecError::Encode)
}

/// Decodes a [`ClientFrame`] from JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the text is not a valid client frame.
pub fn decode_client(text: &str) -> Result<ClientFrame, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

/// Encodes a [`ServerFrame`] as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_server(frame: &ServerFrame) -> Result<String, CodecError> {
    serde_json::to_string(frame).map_err(CodecError::Encode)
}

/// Decodes a [`ServerFrame`] from JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the text is not a valid server frame.
pub fn decode_server(text: &str) -> Result<ServerFrame, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}
