//! Side artifacts keyed by a correlation id: bridge responses and
//! notification pointers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::QueueError;
use super::ids::CorrelationId;

/// Reply to a bridge request, stored at `responses/<id>.<ext>`.
///
/// Read by at most one waiter, which deletes it right after reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseArtifact {
    pub id: CorrelationId,
    pub produced_at: DateTime<Utc>,

    #[serde(default)]
    pub payload: serde_json::Value,

    /// Set when the worker failed the request; the waiter turns it into
    /// `QueueError::Remote`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseArtifact {
    pub fn ok(id: CorrelationId, produced_at: DateTime<Utc>, payload: serde_json::Value) -> Self {
        Self {
            id,
            produced_at,
            payload,
            error: None,
        }
    }

    pub fn error(id: CorrelationId, produced_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            id,
            produced_at,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }

    /// Payload, or `QueueError::Remote` if the worker answered with an error.
    pub fn into_result(self) -> Result<serde_json::Value, QueueError> {
        match self.error {
            Some(message) => Err(QueueError::Remote { id: self.id, message }),
            None => Ok(self.payload),
        }
    }
}

/// Best-effort wake-up hint stored at `notify/<id>.<ext>`.
///
/// Never authoritative: consumers still scan `pending/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPointer {
    pub id: CorrelationId,
    #[serde(default)]
    pub hint: String,
    pub written_at: DateTime<Utc>,
}
