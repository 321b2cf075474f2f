//! Response artifacts for the bridge pattern.
//!
//! A waiter takes a response by renaming it to a hidden name first, so even
//! two waiters polling the same id cannot both read it.

use std::io;

use tracing::{debug, warn};

use super::FsQueue;
use super::fs::{Publish, remove_if_exists, rename_if_exists, write_atomic};
use crate::domain::{CorrelationId, QueueError, ResponseArtifact};

impl FsQueue {
    /// Publish the response for `id`.
    ///
    /// The first response wins; a second one for the same id is dropped with
    /// a warning and `Ok(false)`.
    pub fn respond(&self, id: &CorrelationId, payload: serde_json::Value) -> Result<bool, QueueError> {
        self.publish_response(&ResponseArtifact::ok(id.clone(), self.clock.now(), payload))
    }

    /// Publish an error response for `id`.
    pub fn respond_error(&self, id: &CorrelationId, message: &str) -> Result<bool, QueueError> {
        self.publish_response(&ResponseArtifact::error(id.clone(), self.clock.now(), message))
    }

    fn publish_response(&self, artifact: &ResponseArtifact) -> Result<bool, QueueError> {
        let bytes = self.codec.encode_as(artifact)?;
        let path = self.layout.response_path(&artifact.id);
        match write_atomic(&path, &bytes, Publish::NoClobber) {
            Ok(()) => {
                debug!(id = %artifact.id, "response published");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!(id = %artifact.id, "response already present, keeping the first one");
                Ok(false)
            }
            Err(e) => Err(QueueError::io_at("publishing", &path, e)),
        }
    }

    /// Consume the response for `id`, if one has arrived.
    ///
    /// The file is deleted whether or not it decodes: a corrupt response is
    /// reported once as `QueueError::Decode` and never re-read.
    pub fn take_response(&self, id: &CorrelationId) -> Result<Option<ResponseArtifact>, QueueError> {
        let path = self.layout.response_path(id);
        let taken = self.layout.taken_response_path(id);

        let won = rename_if_exists(&path, &taken)
            .map_err(|e| QueueError::io_at("taking", &path, e))?;
        if !won {
            return Ok(None);
        }

        let read = std::fs::read(&taken);
        if let Err(e) = remove_if_exists(&taken) {
            warn!(id = %id, error = %e, "failed to delete consumed response");
        }
        let bytes = read.map_err(|e| QueueError::io_at("reading", &taken, e))?;

        let artifact: ResponseArtifact = self.decode_at(&bytes, &path)?;
        if artifact.id != *id {
            return Err(QueueError::decode(
                Self::context(&path),
                format!("response id {} does not match file name", artifact.id),
            ));
        }
        Ok(Some(artifact))
    }
}
