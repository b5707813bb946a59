//! Upload task model and its state machine.

use derive_more::Display;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier of an [`UploadTask`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(u64);
impl TaskId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Source of task ids. Injected into the store so tests can predict ids.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> TaskId;
}

/// Monotonic counter starting at 1. Never hands out the same id twice.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}
impl SequentialIds {
    pub fn starting_at(first: u64) -> Self {
        Self { next: AtomicU64::new(first) }
    }
}
impl Default for SequentialIds {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
impl IdGenerator for SequentialIds {
    fn next_id(&self) -> TaskId {
        TaskId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Lifecycle of a task.
///
/// ```text
/// pending ──▶ uploading ──▶ done
///    │            ├───────▶ error
///    └────────────┴───────▶ cancelled
/// ```
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[display("pending")]
    Pending,
    #[display("uploading")]
    Uploading,
    #[display("done")]
    Done,
    #[display("error")]
    Error,
    #[display("cancelled")]
    Cancelled,
}
impl TaskStatus {
    /// `done`, `error` and `cancelled` have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Uploading) | (Pending, Cancelled) | (Uploading, Done) | (Uploading, Error) | (Uploading, Cancelled)
        )
    }
}

/// What a caller knows about a file before it becomes a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub file_name: String,
    pub relative_path: String,
    pub size_bytes: u64,
}
impl TaskDescriptor {
    pub fn new(file_name: impl Into<String>, relative_path: impl Into<String>, size_bytes: u64) -> Self {
        Self { file_name: file_name.into(), relative_path: relative_path.into(), size_bytes }
    }
}

/// One file destined for upload.
///
/// Name, path and size are fixed at creation. Everything else only changes
/// through [`QueueStore::update_task`](crate::QueueStore::update_task).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    id: TaskId,
    file_name: String,
    relative_path: String,
    size_bytes: u64,
    status: TaskStatus,
    progress_percent: u8,
    error_message: Option<String>,
    server_path: Option<String>,
}

impl UploadTask {
    pub(crate) fn new(id: TaskId, descriptor: TaskDescriptor) -> Self {
        Self {
            id,
            file_name: descriptor.file_name,
            relative_path: descriptor.relative_path,
            size_bytes: descriptor.size_bytes,
            status: TaskStatus::Pending,
            progress_percent: 0,
            error_message: None,
            server_path: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Only meaningful while uploading; frozen once terminal.
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Where the backend stored the file, once `done`.
    pub fn server_path(&self) -> Option<&str> {
        self.server_path.as_deref()
    }

    /// Whether a cancel action makes sense for this task.
    pub fn is_cancellable(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Merges `patch` into the task, enforcing the state machine and
    /// monotonic progress. Leaves the task untouched when refused.
    pub(crate) fn apply(&mut self, patch: TaskPatch) -> Update {
        if self.status.is_terminal() {
            return Update::Refused;
        }
        let next = patch.status.unwrap_or(self.status);
        if next != self.status && !self.status.can_transition_to(next) {
            return Update::Refused;
        }
        if patch.status.is_none() && patch.progress_percent.is_some() && next != TaskStatus::Uploading {
            // Progress for a task that hasn't started is a stale callback.
            return Update::Refused;
        }
        let entering = next != self.status;
        self.status = next;
        match next {
            TaskStatus::Uploading => {
                if entering {
                    self.progress_percent = 0;
                }
                if let Some(percent) = patch.progress_percent {
                    self.progress_percent = self.progress_percent.max(percent.min(100));
                }
            },
            TaskStatus::Done if entering => {
                self.progress_percent = 100;
                self.server_path = patch.server_path;
            },
            TaskStatus::Error if entering => {
                self.error_message = Some(patch.error_message.unwrap_or_else(|| "upload failed".to_string()));
            },
            _ => {},
        }
        Update::Applied
    }
}

/// A shallow patch for [`QueueStore::update_task`](crate::QueueStore::update_task).
///
/// Fields left as [`None`] are not touched. `error_message` only applies when
/// entering `error`, `server_path` only when entering `done`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub progress_percent: Option<u8>,
    pub error_message: Option<String>,
    pub server_path: Option<String>,
}
impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    pub fn progress(percent: u8) -> Self {
        Self { progress_percent: Some(percent), ..Self::default() }
    }

    pub fn done(server_path: impl Into<String>) -> Self {
        Self { status: Some(TaskStatus::Done), server_path: Some(server_path.into()), ..Self::default() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: Some(TaskStatus::Error), error_message: Some(message.into()), ..Self::default() }
    }
}

/// Outcome of a patch. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Applied,
    /// No task with that id (it was removed).
    Missing,
    /// The patch would break the state machine (e.g. reviving a cancelled
    /// task); nothing was changed.
    Refused,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn task() -> UploadTask {
        UploadTask::new(TaskId::new(1), TaskDescriptor::new("a.png", "dir/a.png", 10))
    }

    #[rstest]
    #[case(TaskStatus::Pending, TaskStatus::Uploading, true)]
    #[case(TaskStatus::Pending, TaskStatus::Cancelled, true)]
    #[case(TaskStatus::Pending, TaskStatus::Done, false)]
    #[case(TaskStatus::Pending, TaskStatus::Error, false)]
    #[case(TaskStatus::Uploading, TaskStatus::Done, true)]
    #[case(TaskStatus::Uploading, TaskStatus::Error, true)]
    #[case(TaskStatus::Uploading, TaskStatus::Cancelled, true)]
    #[case(TaskStatus::Uploading, TaskStatus::Pending, false)]
    #[case(TaskStatus::Done, TaskStatus::Cancelled, false)]
    #[case(TaskStatus::Cancelled, TaskStatus::Done, false)]
    #[case(TaskStatus::Error, TaskStatus::Uploading, false)]
    fn transitions(#[case] from: TaskStatus, #[case] to: TaskStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn progress_is_monotonic_and_clamped() {
        let mut t = task();
        assert_eq!(t.apply(TaskPatch::status(TaskStatus::Uploading)), Update::Applied);
        assert_eq!(t.apply(TaskPatch::progress(42)), Update::Applied);
        assert_eq!(t.apply(TaskPatch::progress(10)), Update::Applied);
        assert_eq!(t.progress_percent(), 42);
        t.apply(TaskPatch::progress(250));
        assert_eq!(t.progress_percent(), 100);
    }

    #[test]
    fn progress_while_pending_is_refused() {
        let mut t = task();
        assert_eq!(t.apply(TaskPatch::progress(5)), Update::Refused);
        assert_eq!(t.progress_percent(), 0);
    }

    #[test]
    fn terminal_freezes_progress() {
        let mut t = task();
        t.apply(TaskPatch::status(TaskStatus::Uploading));
        t.apply(TaskPatch::progress(30));
        t.apply(TaskPatch::status(TaskStatus::Cancelled));
        assert_eq!(t.apply(TaskPatch::progress(90)), Update::Refused);
        assert_eq!(t.progress_percent(), 30);
        assert!(!t.is_cancellable());
    }

    #[test]
    fn done_records_server_path() {
        let mut t = task();
        t.apply(TaskPatch::status(TaskStatus::Uploading));
        assert_eq!(t.apply(TaskPatch::done("/files/dir/a.png")), Update::Applied);
        assert_eq!(t.status(), TaskStatus::Done);
        assert_eq!(t.progress_percent(), 100);
        assert_eq!(t.server_path(), Some("/files/dir/a.png"));
        assert_eq!(t.error_message(), None);
    }

    #[test]
    fn error_records_message() {
        let mut t = task();
        t.apply(TaskPatch::status(TaskStatus::Uploading));
        t.apply(TaskPatch::error("network unreachable"));
        assert_eq!(t.status(), TaskStatus::Error);
        assert_eq!(t.error_message(), Some("network unreachable"));
    }

    #[test]
    fn sequential_ids_never_repeat() {
        let ids = SequentialIds::default();
        assert_eq!(ids.next_id(), TaskId::new(1));
        assert_eq!(ids.next_id(), TaskId::new(2));
        assert_eq!(SequentialIds::starting_at(10).next_id().get(), 10);
    }
}
