//! Queue Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A queue error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for queue operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upload panel can't be closed while tasks are still pending or
    /// uploading; the caller should keep its close affordance disabled.
    #[display("{active} upload task(s) still active")]
    PanelBusy { active: usize },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Retrying after the active tasks finish will succeed.
        matches!(self, Self::PanelBusy { .. })
    }
}
