//! Pipeline Error Types
//!
//! Errors from the member crates are attached as children of these kinds,
//! so the full tree is still available when reporting.

use derive_more::{Display, Error};

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration is missing something or points somewhere unusable.
    #[display("configuration error")]
    Config,
    /// The queue refused the request (e.g. closing the panel while busy).
    #[display("upload queue error")]
    Queue,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Queue)
    }
}
