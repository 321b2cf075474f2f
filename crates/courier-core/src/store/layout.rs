//! Directory layout of a queue root.
//!
//! ```text
//! <root>/pending/<id>.<ext>
//! <root>/claimed/<id>.<ext>
//! <root>/claimed/.<id>.<ext>.finishing
//! <root>/completed/<id>.<ext>
//! <root>/failed/<id>.<ext>
//! <root>/responses/<id>.<ext>
//! <root>/notify/<id>.<ext>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{CorrelationId, ItemStatus, QueueError};

const RESPONSES_DIR: &str = "responses";
const NOTIFY_DIR: &str = "notify";
const STAGING_SUFFIX: &str = "finishing";
const TAKEN_SUFFIX: &str = "taken";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLayout {
    root: PathBuf,
    ext: String,
}

impl QueueLayout {
    pub fn new(root: impl Into<PathBuf>, ext: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ext: ext.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    pub fn dir(&self, status: ItemStatus) -> PathBuf {
        self.root.join(status.dir_name())
    }

    pub fn responses_dir(&self) -> PathBuf {
        self.root.join(RESPONSES_DIR)
    }

    pub fn notify_dir(&self) -> PathBuf {
        self.root.join(NOTIFY_DIR)
    }

    pub fn item_path(&self, status: ItemStatus, id: &CorrelationId) -> PathBuf {
        self.dir(status).join(id.file_name(&self.ext))
    }

    /// Hidden name a claimed item takes while its terminal record is written.
    pub fn staging_path(&self, id: &CorrelationId) -> PathBuf {
        self.dir(ItemStatus::Claimed)
            .join(format!(".{}.{STAGING_SUFFIX}", id.file_name(&self.ext)))
    }

    pub fn response_path(&self, id: &CorrelationId) -> PathBuf {
        self.responses_dir().join(id.file_name(&self.ext))
    }

    /// Hidden name a response takes once a waiter has won it.
    pub fn taken_response_path(&self, id: &CorrelationId) -> PathBuf {
        self.responses_dir()
            .join(format!(".{}.{TAKEN_SUFFIX}", id.file_name(&self.ext)))
    }

    pub fn notify_path(&self, id: &CorrelationId) -> PathBuf {
        self.notify_dir().join(id.file_name(&self.ext))
    }

    /// Parse `.<id>.<ext>.finishing`.
    pub fn staging_id(&self, name: &str) -> Option<CorrelationId> {
        let inner = name
            .strip_prefix('.')?
            .strip_suffix(STAGING_SUFFIX)?
            .strip_suffix('.')?;
        CorrelationId::from_file_name(inner, &self.ext)
    }

    pub fn id_of(&self, name: &str) -> Option<CorrelationId> {
        CorrelationId::from_file_name(name, &self.ext)
    }

    /// Every directory the queue uses.
    pub fn all_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = ItemStatus::ALL.iter().map(|s| self.dir(*s)).collect();
        dirs.push(self.responses_dir());
        dirs.push(self.notify_dir());
        dirs
    }

    /// Create all directories (idempotent).
    pub fn ensure(&self) -> Result<(), QueueError> {
        for dir in self.all_dirs() {
            fs::create_dir_all(&dir).map_err(|e| QueueError::io_at("creating", &dir, e))?;
        }
        Ok(())
    }
}
