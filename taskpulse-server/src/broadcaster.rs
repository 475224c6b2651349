//! Periodic metrics broadcast.
//!
//! [`MetricsBroadcaster`] samples a [`MetricsSource`] on a fixed interval and
//! publishes each snapshot to a topic. Every tick is independent: a
//! sampling or publishing failure is logged and the loop carries on with the
//! next tick. Nothing is retried or buffered, so a subscriber that is not
//! connected when a snapshot goes out never sees it.
//!
//! Sampling runs on the blocking pool, off the request-handling workers.

use std::sync::Arc;
use std::time::Duration;

use taskpulse_proto::metrics::MetricsSnapshot;
use taskpulse_proto::topic;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::metrics::MetricsSource;
use crate::topics::PublishError;

/// Default time between broadcasts.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(2);

/// Destination for broadcast snapshots.
pub trait SnapshotPublisher: Send + Sync {
    /// Publishes `snapshot` on `topic`, returning how many subscribers it
    /// reached.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the snapshot could not be published.
    fn publish_snapshot(
        &self,
        topic: &str,
        snapshot: &MetricsSnapshot,
    ) -> Result<usize, PublishError>;
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A snapshot went out to this many subscribers (possibly zero).
    Published {
        /// Subscribers reached.
        receivers: usize,
    },
    /// The source failed; nothing was published.
    SamplingFailed,
    /// The snapshot was taken but could not be published.
    PublishFailed,
}

/// Samples metrics and publishes them on a schedule.
pub struct MetricsBroadcaster {
    source: Arc<dyn MetricsSource>,
    publisher: Arc<dyn SnapshotPublisher>,
    topic: String,
    interval: Duration,
}

impl MetricsBroadcaster {
    /// Creates a broadcaster publishing to [`topic::METRICS`] every
    /// [`DEFAULT_BROADCAST_INTERVAL`].
    pub fn new(source: Arc<dyn MetricsSource>, publisher: Arc<dyn SnapshotPublisher>) -> Self {
        Self {
            source,
            publisher,
            topic: topic::METRICS.to_string(),
            interval: DEFAULT_BROADCAST_INTERVAL,
        }
    }

    /// Sets the time between ticks. Zero is bumped to one millisecond.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Sets the destination topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Time between ticks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one sample-and-publish cycle. Never fails; the outcome says what
    /// happened.
    pub fn tick(&self) -> TickOutcome {
        let snapshot = match self.source.sample() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "metrics sampling failed, skipping tick");
                return TickOutcome::SamplingFailed;
            }
        };

        match self.publisher.publish_snapshot(&self.topic, &snapshot) {
            Ok(receivers) => {
                tracing::debug!(
                    topic = %self.topic,
                    receivers,
                    cpu = snapshot.cpu_usage_percent,
                    memory = snapshot.memory_usage_percent,
                    "broadcast metrics"
                );
                TickOutcome::Published { receivers }
            }
            Err(e) => {
                tracing::warn!(topic = %self.topic, error = %e, "metrics publish failed");
                TickOutcome::PublishFailed
            }
        }
    }

    /// Starts the recurring loop on the current tokio runtime.
    ///
    /// The first tick fires immediately. Ticks missed because a cycle ran
    /// long are skipped rather than replayed. The loop ends when the
    /// returned handle is stopped or dropped.
    #[must_use]
    pub fn spawn(self) -> BroadcasterHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = self.interval;
        let broadcaster = Arc::new(self);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval = ?period, "metrics broadcaster started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                let cycle = Arc::clone(&broadcaster);
                if let Err(e) = tokio::task::spawn_blocking(move || cycle.tick()).await {
                    // A panicking source only costs this tick.
                    tracing::error!(error = %e, "metrics broadcast tick aborted");
                }
            }

            tracing::info!("metrics broadcaster stopped");
        });

        BroadcasterHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

/// Owner of a running broadcast loop.
pub struct BroadcasterHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl BroadcasterHandle {
    /// Signals the loop to stop and waits for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "metrics broadcaster task failed");
        }
    }

    /// Whether the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
