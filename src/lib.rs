//! Directory-aware upload pipeline.
//!
//! A selection (dropped files, picked folders) goes through three stages:
//! 1. [`updrop_source`] walks it into `(file, relative path)` pairs,
//! 2. [`updrop_queue`] registers one `pending` task per file,
//! 3. [`updrop_scheduler`] uploads them through a [`Transport`] under a
//!    concurrency cap, writing progress and results back into the queue.
//!
//! [`UploadPipeline`] wires those together. Rendering layers watch the queue
//! through [`UploadPipeline::subscribe`].

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub use updrop_config::Config;
pub use updrop_queue::{QueueState, QueueStore, QueueSummary, TaskId, TaskStatus, UploadTask};
pub use updrop_source::tree::{LocalFile, LocalTree};
pub use updrop_source::{EntryTree, SelectionPayload, SourceFile, WalkedFile};
pub use updrop_transport::backend::LocalTransport;
pub use updrop_transport::{CancellationToken, Progress, ServerPath, Transport, TransportHandle};

use updrop_scheduler::UploadScheduler;

/// Walks selections, queues their files and uploads them.
pub struct UploadPipeline<F: SourceFile> {
    scheduler: UploadScheduler<F>,
}

impl<F: SourceFile> UploadPipeline<F> {
    /// Must be called from within a tokio runtime; the scheduler spawns its
    /// actor right away.
    pub fn new(transport: TransportHandle<F>, concurrency: usize) -> Self {
        Self::with_store(QueueStore::new(), transport, concurrency)
    }

    pub fn with_store(store: QueueStore, transport: TransportHandle<F>, concurrency: usize) -> Self {
        Self { scheduler: UploadScheduler::new(store, transport, concurrency) }
    }

    pub fn from_config(config: &Config, transport: TransportHandle<F>) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::Config)?;
        Ok(Self::new(transport, config.concurrency))
    }

    /// Flattens a selection and queues every file in it.
    ///
    /// Tree entries are walked recursively; when the platform can't resolve
    /// them the selection is treated as plain files instead. Files without a
    /// name are dropped. The upload panel is opened whenever anything was
    /// queued. Returns the new task ids in traversal order.
    pub async fn submit<T>(&self, tree: &T, payload: &SelectionPayload<T::Item>) -> Result<Vec<TaskId>>
    where
        T: EntryTree<File = F>,
    {
        let mut files = updrop_source::collect(tree, payload).await;
        let found = files.len();
        files.retain(|f| !f.file.name().is_empty());
        if files.len() != found {
            warn!(dropped = found - files.len(), "Skipped files without a name");
        }
        if files.is_empty() {
            debug!(items = payload.len(), "Selection contained no files");
            return Ok(Vec::new());
        }
        self.store().set_panel_visible(true).or_raise(|| ErrorKind::Queue)?;
        let ids = self.scheduler.enqueue(files);
        info!(items = payload.len(), files = ids.len(), "Submitted selection");
        Ok(ids)
    }

    pub fn cancel_task(&self, id: TaskId) -> bool {
        self.scheduler.cancel_task(id)
    }

    pub fn cancel_all(&self) -> usize {
        self.scheduler.cancel_all()
    }

    /// Dismisses a task from the list. Does not cancel a running upload;
    /// call [`cancel_task`](Self::cancel_task) first for that.
    pub fn remove_task(&self, id: TaskId) -> bool {
        self.store().remove_task(id)
    }

    pub fn clear_finished(&self) -> usize {
        self.store().clear_finished()
    }

    /// Hides the upload panel. Fails while any upload is still active.
    pub fn close_panel(&self) -> Result<()> {
        self.store().set_panel_visible(false).or_raise(|| ErrorKind::Queue)
    }

    pub fn store(&self) -> &QueueStore {
        self.scheduler.store()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.store().subscribe()
    }

    pub async fn wait_idle(&self) {
        self.scheduler.wait_idle().await;
    }
}

impl UploadPipeline<LocalFile> {
    /// A pipeline that copies local files into the configured destination,
    /// along with the tree to walk local selections with.
    pub fn local(config: &Config) -> Result<(Self, LocalTree)> {
        let Some(destination) = &config.destination else {
            exn::bail!(ErrorKind::Config);
        };
        let transport = LocalTransport::new("local", destination).or_raise(|| ErrorKind::Config)?;
        let pipeline = Self::from_config(config, Arc::new(transport))?;
        Ok((pipeline, LocalTree::new(config.page_size)))
    }
}
