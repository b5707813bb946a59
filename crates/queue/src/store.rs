//! The queue store: single source of truth for upload tasks.

use crate::error::{ErrorKind, Result};
use crate::task::{IdGenerator, SequentialIds, TaskDescriptor, TaskId, TaskPatch, TaskStatus, Update, UploadTask};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Everything a rendering layer needs: the ordered task list and whether
/// the upload panel is shown.
///
/// Lookups by id and the per-status counts are kept up to date on every
/// mutation, so neither costs more than a hash lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    tasks: Vec<UploadTask>,
    #[serde(skip)]
    index: HashMap<TaskId, usize>,
    summary: QueueSummary,
    panel_visible: bool,
}

impl QueueState {
    /// Tasks in insertion order, regardless of status.
    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&UploadTask> {
        self.index.get(&id).and_then(|&i| self.tasks.get(i))
    }

    pub fn panel_visible(&self) -> bool {
        self.panel_visible
    }

    pub fn summary(&self) -> QueueSummary {
        self.summary
    }

    /// No task is pending or uploading.
    pub fn is_idle(&self) -> bool {
        self.summary.active() == 0
    }

    /// The panel may only be closed once every task reached a terminal status.
    pub fn can_close_panel(&self) -> bool {
        self.is_idle()
    }

    fn push(&mut self, task: UploadTask) {
        self.index.insert(task.id(), self.tasks.len());
        self.summary.total += 1;
        *self.summary.count_mut(task.status()) += 1;
        self.tasks.push(task);
    }

    fn apply(&mut self, id: TaskId, patch: TaskPatch) -> Update {
        let Some(task) = self.index.get(&id).and_then(|&i| self.tasks.get_mut(i)) else {
            return Update::Missing;
        };
        let before = task.status();
        let outcome = task.apply(patch);
        let after = task.status();
        if before != after {
            *self.summary.count_mut(before) -= 1;
            *self.summary.count_mut(after) += 1;
        }
        outcome
    }

    /// Keeps only the tasks matching `keep` and returns how many were
    /// dropped. Rebuilds the index, so it's linear in the number of tasks.
    fn retain(&mut self, mut keep: impl FnMut(&UploadTask) -> bool) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| keep(t));
        let removed = before - self.tasks.len();
        if removed > 0 {
            self.index = self.tasks.iter().enumerate().map(|(i, t)| (t.id(), i)).collect();
            self.summary = QueueSummary { total: self.tasks.len(), ..QueueSummary::default() };
            for task in &self.tasks {
                *self.summary.count_mut(task.status()) += 1;
            }
        }
        removed
    }
}

/// Aggregate counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueSummary {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub done: usize,
    pub error: usize,
    pub cancelled: usize,
}
impl QueueSummary {
    pub fn active(&self) -> usize {
        self.pending + self.uploading
    }

    pub fn finished(&self) -> usize {
        self.done + self.error + self.cancelled
    }

    fn count_mut(&mut self, status: TaskStatus) -> &mut usize {
        match status {
            TaskStatus::Pending => &mut self.pending,
            TaskStatus::Uploading => &mut self.uploading,
            TaskStatus::Done => &mut self.done,
            TaskStatus::Error => &mut self.error,
            TaskStatus::Cancelled => &mut self.cancelled,
        }
    }
}

/// Owns the ordered task collection and the panel flag.
///
/// Cheap to clone; clones share the same state. Every mutation is applied
/// atomically and is visible to [`subscribe`](Self::subscribe)rs as soon as
/// the method returns. No-op mutations (unknown id, refused patch) don't
/// notify anyone.
///
/// # Examples
///
/// ```
/// use updrop_queue::{QueueStore, TaskDescriptor, TaskPatch, TaskStatus, Update};
///
/// let store = QueueStore::new();
/// let ids = store.add_tasks([TaskDescriptor::new("a.png", "a.png", 3)]);
/// assert_eq!(store.update_task(ids[0], TaskPatch::status(TaskStatus::Cancelled)), Update::Applied);
/// // A late success can't revive a cancelled task.
/// assert_eq!(store.update_task(ids[0], TaskPatch::done("/a.png")), Update::Refused);
/// ```
#[derive(Clone)]
pub struct QueueStore {
    state: Arc<watch::Sender<QueueState>>,
    ids: Arc<dyn IdGenerator>,
}

impl Default for QueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStore {
    pub fn new() -> Self {
        Self::with_ids(SequentialIds::default())
    }

    pub fn with_ids(ids: impl IdGenerator + 'static) -> Self {
        let (state, _) = watch::channel(QueueState::default());
        Self { state: Arc::new(state), ids: Arc::new(ids) }
    }

    /// Registers one `pending` task per descriptor, in order, and returns
    /// their ids in the same order.
    pub fn add_tasks(&self, descriptors: impl IntoIterator<Item = TaskDescriptor>) -> Vec<TaskId> {
        let mut ids = Vec::new();
        self.state.send_if_modified(|state| {
            for descriptor in descriptors {
                let mut id = self.ids.next_id();
                // Guard against an injected generator handing out an id that's
                // still in use.
                while state.task(id).is_some() {
                    id = self.ids.next_id();
                }
                state.push(UploadTask::new(id, descriptor));
                ids.push(id);
            }
            !ids.is_empty()
        });
        debug!(count = ids.len(), "Queued upload tasks");
        ids
    }

    /// Shallow-merges `patch` into the task with `id`.
    ///
    /// Updates for ids that no longer exist return [`Update::Missing`].
    /// Patches that would break the task state machine, such as leaving a
    /// terminal status, return [`Update::Refused`]. Neither is an error: both
    /// happen routinely when a network callback races a cancel or a removal.
    /// A progress value lower than the current one is ignored.
    pub fn update_task(&self, id: TaskId, patch: TaskPatch) -> Update {
        let mut outcome = Update::Missing;
        self.state.send_if_modified(|state| {
            outcome = state.apply(id, patch);
            outcome == Update::Applied
        });
        if outcome != Update::Applied {
            trace!(task = %id, ?outcome, "Ignored task update");
        }
        outcome
    }

    /// Deletes a task regardless of status. Pure bookkeeping: an in-flight
    /// upload is *not* cancelled. Returns `false` if there was no such task.
    pub fn remove_task(&self, id: TaskId) -> bool {
        self.state.send_if_modified(|state| state.task(id).is_some() && state.retain(|t| t.id() != id) > 0)
    }

    /// Removes every `done`, `error` and `cancelled` task, returning how many
    /// were removed. Active tasks are untouched.
    pub fn clear_finished(&self) -> usize {
        let mut removed = 0;
        self.state.send_if_modified(|state| {
            removed = state.retain(|t| !t.status().is_terminal());
            removed > 0
        });
        removed
    }

    /// Shows or hides the upload panel. Hiding is refused with
    /// [`ErrorKind::PanelBusy`] while any task is still active; the store
    /// never silently overrides the request.
    pub fn set_panel_visible(&self, visible: bool) -> Result<()> {
        let mut busy = None;
        self.state.send_if_modified(|state| {
            if !visible && !state.can_close_panel() {
                busy = Some(state.summary().active());
                return false;
            }
            let changed = state.panel_visible != visible;
            state.panel_visible = visible;
            changed
        });
        match busy {
            Some(active) => exn::bail!(ErrorKind::PanelBusy { active }),
            None => Ok(()),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> QueueState {
        self.state.borrow().clone()
    }

    pub fn task(&self, id: TaskId) -> Option<UploadTask> {
        self.state.borrow().task(id).cloned()
    }

    pub fn summary(&self) -> QueueSummary {
        self.state.borrow().summary()
    }

    /// A receiver that always holds the latest state.
    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.state.subscribe()
    }
}
