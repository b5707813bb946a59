//! Upload tasks and the store that owns them.
//!
//! [`QueueStore`] is the only sanctioned way to create, change, or remove
//! [`UploadTask`]s. Rendering layers read it through
//! [`snapshot`](QueueStore::snapshot) or [`subscribe`](QueueStore::subscribe).

pub mod error;
mod store;
mod task;

pub use crate::store::{QueueState, QueueStore, QueueSummary};
pub use crate::task::{IdGenerator, SequentialIds, TaskDescriptor, TaskId, TaskPatch, TaskStatus, Update, UploadTask};
