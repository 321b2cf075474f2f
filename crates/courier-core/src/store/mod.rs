//! Store: the filesystem-backed queue.
//!
//! `FsQueue` is the only type that touches the queue directories. Its API is
//! synchronous (`std::fs`); the async loops in `app` call it through
//! `spawn_blocking`.
//!
//! Ownership of an item changes hands only through `rename(2)`:
//! - claim:     `pending/<id>`   -> `claimed/<id>`
//! - terminate: `claimed/<id>`   -> `claimed/.<id>.finishing` -> `{completed,failed}/<id>`
//! - sweep:     `claimed/<id>`   -> `pending/<id>` (expired lease)

mod fs;
mod layout;
mod mover;
mod notify;
mod producer;
mod responses;
mod retention;
mod status;
mod sweep;

pub use layout::QueueLayout;
pub use mover::Termination;
pub use producer::EnqueueOptions;
pub use retention::PurgeReport;
pub use status::QueueCounts;
pub use sweep::SweepReport;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::{CorrelationId, QueueError};
use crate::ports::{Clock, Codec, IdGenerator, JsonCodec, SequentialIdGenerator, SystemClock};

/// Handle to one queue root.
///
/// Cheap to clone; clones share the codec, clock and id generator.
#[derive(Clone)]
pub struct FsQueue {
    layout: QueueLayout,
    codec: Arc<dyn Codec>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl FsQueue {
    /// Handle with JSON documents, the system clock and a sequential id
    /// generator. Does no I/O; see [`FsQueue::init`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let codec: Arc<dyn Codec> = Arc::new(JsonCodec);
        Self {
            layout: QueueLayout::new(root, codec.extension()),
            codec,
            clock: Arc::new(SystemClock),
            ids: Arc::new(SequentialIdGenerator::new(SystemClock)),
        }
    }

    /// `new` + `init`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, QueueError> {
        Self::new(root).init()
    }

    /// Create the queue directories if needed.
    pub fn init(self) -> Result<Self, QueueError> {
        self.layout.ensure()?;
        Ok(self)
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.layout = QueueLayout::new(self.layout.root().to_path_buf(), codec.extension());
        self.codec = codec;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &QueueLayout {
        &self.layout
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn context(path: &Path) -> String {
        path.display().to_string()
    }

    fn decode_at<T: serde::de::DeserializeOwned>(
        &self,
        bytes: &[u8],
        path: &Path,
    ) -> Result<T, QueueError> {
        self.codec.decode_as(bytes, &Self::context(path))
    }

    fn new_id(&self) -> CorrelationId {
        self.ids.next_id()
    }

    /// `now - age`, or `None` when that is before any representable time.
    fn cutoff(&self, age: std::time::Duration) -> Option<chrono::DateTime<chrono::Utc>> {
        let age = chrono::TimeDelta::from_std(age).ok()?;
        self.clock.now().checked_sub_signed(age)
    }
}

impl std::fmt::Debug for FsQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsQueue")
            .field("root", &self.layout.root())
            .field("ext", &self.layout.ext())
            .finish_non_exhaustive()
    }
}
