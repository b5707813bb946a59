//! The transport adapter: how a single file's bytes reach the backend.
//!
//! The scheduler only ever talks to a [`Transport`]. Each call gets the file,
//! its relative path, a [`Progress`] reporter, and a [`CancellationToken`]
//! that fires when the user cancels the task.

pub mod backend;
pub mod error;
mod path;
mod progress;

pub use crate::path::validate as validate_path;
pub use crate::progress::Progress;
pub use tokio_util::sync::CancellationToken;

use crate::error::Result;
use async_trait::async_trait;
use derive_more::Display;
use std::sync::Arc;
use updrop_source::SourceFile;

pub type TransportHandle<F> = Arc<dyn Transport<F>>;

/// Where the backend put an uploaded file.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub struct ServerPath(String);
impl ServerPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Uploads one file to a storage backend.
///
/// # Contract
/// - Progress for one call is reported through `progress` only, in
///   non-decreasing order (the [`Progress`] reporter enforces it anyway).
/// - When `cancel` fires the call should stop as soon as practical and
///   return [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled).
///   Callers may also simply drop the future.
/// - There is no timeout: a call may run until it resolves, fails, or is
///   cancelled.
#[async_trait]
pub trait Transport<F: SourceFile>: Send + Sync {
    /// Name of the backend, for logging only.
    fn name(&self) -> &str;

    async fn upload(&self, file: F, relative_path: &str, progress: Progress, cancel: CancellationToken) -> Result<ServerPath>;
}
