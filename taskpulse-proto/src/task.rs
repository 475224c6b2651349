//! Task record types and their field rules.
//!
//! A [`Task`] is the stored record. Callers never build one directly: they
//! submit a [`TaskDraft`] (the user-editable fields), which is checked with
//! [`TaskDraft::validate`] and then turned into a record by the store.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum allowed task title length in characters.
pub const MIN_TASK_TITLE_LENGTH: usize = 3;

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 100;

/// Maximum allowed task description length in characters.
pub const MAX_TASK_DESCRIPTION_LENGTH: usize = 500;

/// Unique identifier for a task, based on UUID v7 for time-ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Creates a new time-ordered task identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `TaskId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Status of a task. A flat field: any status may follow any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Pending,
    /// Actively being worked on.
    InProgress,
    /// Done.
    Completed,
    /// Abandoned.
    Cancelled,
}

impl TaskStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    /// Can wait.
    Low,
    /// The usual case.
    #[default]
    Medium,
    /// Should be picked up soon.
    High,
    /// Drop everything.
    Critical,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A stored task record.
///
/// `completed_at` records the *first* time the task reached
/// [`TaskStatus::Completed`]. It is never cleared, so a reopened task keeps
/// its original completion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Store-assigned identifier, immutable.
    pub id: TaskId,
    /// Short summary, 3 to 100 characters.
    pub title: String,
    /// Optional longer text, up to 500 characters.
    pub description: Option<String>,
    /// Current status.
    pub status: TaskStatus,
    /// Current priority.
    pub priority: TaskPriority,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated; `None` until the first update.
    pub updated_at: Option<DateTime<Utc>>,
    /// First time the status became `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

/// The caller-editable fields of a task, used for both create and update.
///
/// Updates are full replacements: a draft with no description clears the
/// stored description, and omitted status/priority fall back to their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    /// Task title. Missing is treated as blank so it fails validation
    /// rather than deserialization.
    #[serde(default)]
    pub title: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Status, `Pending` when omitted.
    #[serde(default)]
    pub status: TaskStatus,
    /// Priority, `Medium` when omitted.
    #[serde(default)]
    pub priority: TaskPriority,
}

impl TaskDraft {
    /// Creates a draft with the given title and default everything else.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Checks the field rules, reporting the first violated field.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the title is blank or outside
    /// 3..=100 characters, or the description exceeds 500 characters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::TitleBlank);
        }
        let title_len = self.title.chars().count();
        if !(MIN_TASK_TITLE_LENGTH..=MAX_TASK_TITLE_LENGTH).contains(&title_len) {
            return Err(ValidationError::TitleLength(title_len));
        }
        if let Some(description) = &self.description {
            let len = description.chars().count();
            if len > MAX_TASK_DESCRIPTION_LENGTH {
                return Err(ValidationError::DescriptionTooLong(len));
            }
        }
        Ok(())
    }
}

/// A task field rule that a draft broke.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Title is empty or whitespace.
    #[error("title is required")]
    TitleBlank,
    /// Title length (in characters) is out of range.
    #[error(
        "title must be between {MIN_TASK_TITLE_LENGTH} and {MAX_TASK_TITLE_LENGTH} characters (got {0})"
    )]
    TitleLength(usize),
    /// Description length (in characters) is over the limit.
    #[error("description cannot exceed {MAX_TASK_DESCRIPTION_LENGTH} characters (got {0})")]
    DescriptionTooLong(usize),
}

impl ValidationError {
    /// Name of the offending field as it appears on the wire.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::TitleBlank | Self::TitleLength(_) => "title",
            Self::DescriptionTooLong(_) => "description",
        }
    }
}

/// Count-by-status summary, computed fresh on every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatistics {
    /// All tasks.
    pub total: u64,
    /// Tasks in `Pending`.
    pub pending: u64,
    /// Tasks in `InProgress`.
    pub in_progress: u64,
    /// Tasks in `Completed`.
    pub completed: u64,
    /// Tasks in `Cancelled`.
    pub cancelled: u64,
}

impl TaskStatistics {
    /// Returns the count recorded for `status`.
    #[must_use]
    pub const fn count_for(&self, status: TaskStatus) -> u64 {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Completed => self.completed,
            TaskStatus::Cancelled => self.cancelled,
        }
    }
}
