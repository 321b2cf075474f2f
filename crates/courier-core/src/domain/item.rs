//! Queue item model: the document persisted under each lifecycle directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::CorrelationId;

/// Lifecycle status of an item.
///
/// State transitions:
/// - Pending -> Claimed -> Completed
/// - Pending -> Claimed -> Failed
/// - Claimed -> Pending (lease expired, reclaimed by the sweeper)
///
/// The status is never stored in the document; it is whichever directory
/// currently holds the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    Claimed,
    Completed,
    Failed,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Pending,
        ItemStatus::Claimed,
        ItemStatus::Completed,
        ItemStatus::Failed,
    ];

    /// Directory name under the queue root.
    pub fn dir_name(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Claimed => "claimed",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

/// The unit of work persisted to disk.
///
/// `result`/`completed_at` only appear in `completed/`, `error`/`failed_at`
/// only in `failed/`; both are written in the same atomic step that places
/// the file in its terminal directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: CorrelationId,
    pub created_at: DateTime<Utc>,
    pub kind: String,
    pub payload: serde_json::Value,

    /// Advisory ordering hint; higher first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub fn new(
        id: CorrelationId,
        created_at: DateTime<Utc>,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id,
            created_at,
            kind: kind.into(),
            payload,
            priority: None,
            result: None,
            error: None,
            completed_at: None,
            failed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: Option<i32>) -> Self {
        self.priority = priority;
        self
    }

    /// Produce the terminal record for `outcome`, stamped at `at`.
    pub fn into_terminal(mut self, outcome: Outcome, at: DateTime<Utc>) -> Self {
        match outcome {
            Outcome::Success(result) => {
                self.result = Some(result);
                self.completed_at = Some(at);
                self.error = None;
                self.failed_at = None;
            }
            Outcome::Failure(error) => {
                self.error = Some(error);
                self.failed_at = Some(at);
                self.result = None;
                self.completed_at = None;
            }
        }
        self
    }
}

/// Result of processing an item, handed to `terminate`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(serde_json::Value),
    Failure(String),
}

impl Outcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Outcome::Failure(reason.into())
    }

    /// Terminal directory this outcome lands in.
    pub fn status(&self) -> ItemStatus {
        match self {
            Outcome::Success(_) => ItemStatus::Completed,
            Outcome::Failure(_) => ItemStatus::Failed,
        }
    }
}
