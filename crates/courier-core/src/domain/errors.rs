//! Errors - エラー型と分類
//!
//! 構造的なエラー（I/O, decode）は呼び出し元へ伝播する。
//! handler の業務エラーはここには現れず、`failed/` の record として残る。

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use super::ids::CorrelationId;

/// Errors surfaced by the queue core.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A filesystem operation failed (disk full, permission denied, ...).
    /// Never retried by the core.
    #[error("i/o error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// `terminate` was called for an item this caller no longer owns.
    #[error("item {0} is not claimed")]
    NotClaimed(CorrelationId),

    #[error("timed out after {waited:?} waiting for response to {id}")]
    Timeout { id: CorrelationId, waited: Duration },

    #[error("wait for response to {id} was cancelled")]
    Cancelled { id: CorrelationId },

    /// File content could not be parsed as the expected document shape.
    #[error("decode error: {context}: {message}")]
    Decode { context: String, message: String },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("kind must not be empty")]
    InvalidKind,

    #[error("invalid correlation id: {0}")]
    InvalidId(String),

    /// The worker answered a bridge request with an error.
    #[error("request {id} failed remotely: {message}")]
    Remote { id: CorrelationId, message: String },

    #[error("blocking task failed: {0}")]
    Blocking(String),
}

/// Coarse classification for callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

impl QueueError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io_at(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("{action} {}", path.display()), source)
    }

    pub(crate) fn decode(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::Timeout { .. } | Self::Blocking(_) => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
