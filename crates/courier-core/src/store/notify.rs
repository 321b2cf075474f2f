//! Notification side-channel.
//!
//! Pointers let an external watcher wake up without scanning `pending/`.
//! They are hints only: losing one never loses work.

use tracing::warn;

use super::FsQueue;
use super::fs::{Publish, file_names, remove_if_exists, write_atomic};
use crate::domain::{CorrelationId, NotificationPointer, QueueError};

impl FsQueue {
    /// Write `notify/<id>.<ext>`.
    pub fn notify(&self, id: &CorrelationId, hint: &str) -> Result<(), QueueError> {
        let pointer = NotificationPointer {
            id: id.clone(),
            hint: hint.to_string(),
            written_at: self.clock.now(),
        };
        let bytes = self.codec.encode_as(&pointer)?;
        let path = self.layout.notify_path(id);
        write_atomic(&path, &bytes, Publish::Replace)
            .map_err(|e| QueueError::io_at("writing", &path, e))
    }

    /// Read and delete every pointer. Unreadable pointers are deleted and
    /// skipped.
    pub fn drain_notifications(&self) -> Result<Vec<NotificationPointer>, QueueError> {
        let dir = self.layout.notify_dir();
        let names = file_names(&dir).map_err(|e| QueueError::io_at("listing", &dir, e))?;

        let mut pointers = Vec::new();
        for name in names {
            if self.layout.id_of(&name).is_none() {
                continue;
            }
            let path = dir.join(&name);
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                // 他の watcher が先に消した
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(QueueError::io_at("reading", &path, e)),
            };
            if let Err(e) = remove_if_exists(&path) {
                warn!(path = %path.display(), error = %e, "failed to delete notification pointer");
            }
            match self.decode_at::<NotificationPointer>(&bytes, &path) {
                Ok(pointer) => pointers.push(pointer),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable notification pointer"),
            }
        }
        Ok(pointers)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::test_queue;
    use super::*;

    #[test]
    fn drain_returns_and_removes_pointers() {
        let t = test_queue();
        let a = CorrelationId::new("a-1").unwrap();
        let b = CorrelationId::new("b-1").unwrap();
        t.queue.notify(&a, "plan").unwrap();
        t.queue.notify(&b, "analysis").unwrap();

        let drained = t.queue.drain_notifications().unwrap();
        let ids: Vec<_> = drained.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![a, b]);
        assert!(t.queue.drain_notifications().unwrap().is_empty());
    }

    #[test]
    fn unreadable_pointer_is_skipped_and_removed() {
        let t = test_queue();
        let bad = t.queue.layout().notify_dir().join("bad-1.json");
        std::fs::write(&bad, b"nope").unwrap();
        t.queue.notify(&CorrelationId::new("ok-1").unwrap(), "").unwrap();

        let drained = t.queue.drain_notifications().unwrap();
        assert_eq!(drained.len(), 1);
        assert!(!bad.exists());
    }
}
