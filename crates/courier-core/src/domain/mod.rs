//! Domain model (ids, items, artifacts, errors).

pub mod artifact;
pub mod errors;
pub mod ids;
pub mod item;

pub use artifact::{NotificationPointer, ResponseArtifact};
pub use errors::{ErrorKind, QueueError};
pub use ids::CorrelationId;
pub use item::{ItemStatus, Outcome, QueueItem};
