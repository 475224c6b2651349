//! In-process publish/subscribe hub keyed by topic name.
//!
//! Each topic is a bounded [`tokio::sync::broadcast`] channel, created on
//! first use. Delivery is best-effort: a message published while nobody is
//! subscribed is dropped, and a subscriber that falls more than the channel
//! capacity behind skips what it missed. Nothing is replayed to late
//! subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use taskpulse_proto::metrics::MetricsSnapshot;
use tokio::sync::broadcast;

use crate::broadcaster::SnapshotPublisher;

/// Default per-topic buffer before slow subscribers start skipping.
pub const DEFAULT_TOPIC_CAPACITY: usize = 64;

/// A message as delivered to subscribers.
pub type TopicMessage = Arc<serde_json::Value>;

/// Errors that can occur when publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The message body could not be converted to JSON.
    #[error("failed to serialize message for {topic}: {source}")]
    Serialize {
        /// Target topic.
        topic: String,
        /// Underlying serializer error.
        source: serde_json::Error,
    },
}

/// Topic registry and fan-out.
pub struct TopicHub {
    topics: RwLock<HashMap<String, broadcast::Sender<TopicMessage>>>,
    capacity: usize,
}

impl Default for TopicHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicHub {
    /// Creates an empty hub with the default per-topic capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Creates an empty hub with a custom per-topic capacity (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to `topic`, creating it if needed.
    ///
    /// The receiver sees messages published after this call only.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<TopicMessage> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.subscribe();
        }
        let mut topics = self.topics.write();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publishes an already-built JSON value, returning how many subscribers
    /// it reached. Zero subscribers is not an error.
    pub fn publish(&self, topic: &str, message: serde_json::Value) -> usize {
        let Some(sender) = self.topics.read().get(topic).cloned() else {
            tracing::trace!(topic = %topic, "no subscribers, message dropped");
            return 0;
        };
        // Err only means every receiver is gone.
        sender.send(Arc::new(message)).unwrap_or(0)
    }

    /// Serializes `body` and publishes it.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Serialize`] if `body` cannot be converted.
    pub fn publish_json<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        body: &T,
    ) -> Result<usize, PublishError> {
        let value = serde_json::to_value(body).map_err(|source| PublishError::Serialize {
            topic: topic.to_string(),
            source,
        })?;
        Ok(self.publish(topic, value))
    }

    /// Current number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl SnapshotPublisher for TopicHub {
    fn publish_snapshot(
        &self,
        topic: &str,
        snapshot: &MetricsSnapshot,
    ) -> Result<usize, PublishError> {
        self.publish_json(topic, snapshot)
    }
}
