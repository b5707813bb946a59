//! Moves queued upload tasks through a transport.
//!
//! [`UploadScheduler`] owns a single actor task. Admissions, completions and
//! aborts are all handled inside that actor, one event at a time, so the
//! number of running uploads never has to be shared. Task status lives in
//! the [`QueueStore`]; the actor only keeps the file handles of tasks that
//! haven't started yet, in the order they were queued, and the cancellation
//! tokens of those that have.

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use updrop_queue::{QueueState, QueueStore, TaskDescriptor, TaskId, TaskPatch, TaskStatus, Update};
use updrop_source::{SourceFile, WalkedFile};
use updrop_transport::error::{ErrorKind as TransportErrorKind, Result as TransportResult};
use updrop_transport::{CancellationToken, Progress, ServerPath, TransportHandle};

enum Command<F> {
    Enqueue(Vec<(TaskId, WalkedFile<F>)>),
    Abort(TaskId),
}

/// Uploads queued files, at most `concurrency` at a time, earliest first.
///
/// Cancelling marks the task `cancelled` in the store before returning and
/// then fires the upload's cancellation token, so a late result from the
/// transport is discarded instead of reviving the task. Dropping the
/// scheduler stops its actor and drops every running upload.
pub struct UploadScheduler<F: SourceFile> {
    store: QueueStore,
    commands: mpsc::UnboundedSender<Command<F>>,
    /// Held across registering and staging so the actor sees batches in
    /// the same order as the store.
    enqueue_order: Mutex<()>,
    concurrency: usize,
}

impl<F: SourceFile> UploadScheduler<F> {
    /// Spawns the scheduler actor onto the current tokio runtime.
    ///
    /// A `concurrency` of zero is treated as one.
    ///
    /// # Panics
    ///
    /// Panics if called from outside a tokio runtime.
    pub fn new(store: QueueStore, transport: TransportHandle<F>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (commands, receiver) = mpsc::unbounded_channel();
        let actor = Actor {
            store: store.clone(),
            transport,
            concurrency,
            commands: receiver,
            staged: VecDeque::new(),
            tokens: HashMap::new(),
            in_flight: FuturesUnordered::new(),
        };
        tokio::spawn(actor.run());
        Self { store, commands, enqueue_order: Mutex::new(()), concurrency }
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Registers one `pending` task per file, in order, and schedules them.
    /// Returns the new task ids in the same order.
    pub fn enqueue(&self, files: Vec<WalkedFile<F>>) -> Vec<TaskId> {
        if files.is_empty() {
            return Vec::new();
        }
        let descriptors: Vec<_> = files
            .iter()
            .map(|f| TaskDescriptor::new(f.file.name(), f.relative_path.as_str(), f.file.size()))
            .collect();
        let _order = self.enqueue_order.lock().unwrap_or_else(PoisonError::into_inner);
        let ids = self.store.add_tasks(descriptors);
        let staged = ids.iter().copied().zip(files).collect();
        if self.commands.send(Command::Enqueue(staged)).is_err() {
            warn!(count = ids.len(), "Scheduler has stopped; tasks will stay pending");
        }
        info!(count = ids.len(), "Enqueued uploads");
        ids
    }

    /// Cancels a `pending` or `uploading` task.
    ///
    /// The store reflects `cancelled` as soon as this returns; the transport
    /// is told to abort afterwards. Returns `false` if the task doesn't exist
    /// or is already terminal.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        if self.store.update_task(id, TaskPatch::status(TaskStatus::Cancelled)) != Update::Applied {
            return false;
        }
        debug!(task = %id, "Cancelled task");
        // The actor being gone means nothing is running anyway.
        let _ = self.commands.send(Command::Abort(id));
        true
    }

    /// Cancels every task that isn't terminal yet and returns how many were
    /// cancelled. `done`, `error` and `cancelled` tasks are left alone.
    pub fn cancel_all(&self) -> usize {
        let active: Vec<TaskId> = self
            .store
            .snapshot()
            .tasks()
            .iter()
            .filter(|t| !t.status().is_terminal())
            .map(|t| t.id())
            .collect();
        let cancelled = active.into_iter().filter(|id| self.cancel_task(*id)).count();
        info!(count = cancelled, "Cancelled all active uploads");
        cancelled
    }

    /// Resolves once no task is `pending` or `uploading`.
    pub async fn wait_idle(&self) {
        let mut state = self.store.subscribe();
        // The store keeps the sender alive for as long as we hold it.
        let _ = state.wait_for(QueueState::is_idle).await;
    }
}

type Upload = BoxFuture<'static, (TaskId, TransportResult<ServerPath>)>;

struct Actor<F: SourceFile> {
    store: QueueStore,
    transport: TransportHandle<F>,
    concurrency: usize,
    commands: mpsc::UnboundedReceiver<Command<F>>,
    /// Files of tasks that haven't been admitted yet, earliest first.
    staged: VecDeque<(TaskId, WalkedFile<F>)>,
    tokens: HashMap<TaskId, CancellationToken>,
    in_flight: FuturesUnordered<Upload>,
}

impl<F: SourceFile> Actor<F> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Enqueue(files)) => self.staged.extend(files),
                    Some(Command::Abort(id)) => self.abort(id),
                    None => break,
                },
                Some((id, result)) = self.in_flight.next(), if !self.in_flight.is_empty() => self.finish(id, result),
            }
            self.admit();
        }
        debug!(dropped = self.in_flight.len(), "Scheduler stopped");
    }

    /// Fills free slots with the earliest staged tasks that are still
    /// `pending`. Cancelled or removed tasks are dropped as they come up.
    fn admit(&mut self) {
        while self.in_flight.len() < self.concurrency {
            let Some((id, file)) = self.staged.pop_front() else {
                break;
            };
            match self.store.update_task(id, TaskPatch::status(TaskStatus::Uploading)) {
                Update::Applied => self.start(id, file),
                Update::Refused | Update::Missing => debug!(task = %id, "Dropped a task that left the queue before starting"),
            }
        }
    }

    fn start(&mut self, id: TaskId, file: WalkedFile<F>) {
        debug!(task = %id, transport = %self.transport.name(), path = %file.relative_path, "Starting upload");
        let token = CancellationToken::new();
        self.tokens.insert(id, token.clone());
        let transport = self.transport.clone();
        let store = self.store.clone();
        let progress = Progress::new(move |percent| {
            store.update_task(id, TaskPatch::progress(percent));
        });
        self.in_flight.push(Box::pin(async move {
            let WalkedFile { file, relative_path } = file;
            let result = tokio::select! {
                result = transport.upload(file, &relative_path, progress, token.clone()) => result,
                () = token.cancelled() => Err(exn::Exn::from(TransportErrorKind::Cancelled)),
            };
            (id, result)
        }));
    }

    /// Staged files of cancelled tasks are left for `admit` to drop.
    fn abort(&mut self, id: TaskId) {
        if let Some(token) = self.tokens.remove(&id) {
            token.cancel();
        }
    }

    fn finish(&mut self, id: TaskId, result: TransportResult<ServerPath>) {
        self.tokens.remove(&id);
        let patch = match result {
            Ok(path) => {
                info!(task = %id, server_path = %path, "Upload complete");
                TaskPatch::done(path.into_string())
            },
            Err(e) if e.is_cancelled() => TaskPatch::status(TaskStatus::Cancelled),
            Err(e) => {
                warn!(task = %id, transport = %self.transport.name(), error = %&*e, "Upload failed");
                TaskPatch::error((*e).to_string())
            },
        };
        match self.store.update_task(id, patch) {
            Update::Applied => {},
            Update::Refused => debug!(task = %id, "Discarded result for a task that was already terminal"),
            Update::Missing => debug!(task = %id, "Discarded result for a removed task"),
        }
    }
}
