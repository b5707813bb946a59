//! Transport Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A transport error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every kind except [`Cancelled`](Self::Cancelled) ends a task in `error`,
/// with the kind's display string as its message.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection-level failure (unreachable, reset, DNS, ...).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The backend answered but rejected the upload.
    #[display("server error {status}: {message}")]
    Server { status: u16, message: String },
    /// Local I/O while writing the destination.
    #[display("I/O error")]
    Io,
    /// The source file could not be read.
    #[display("could not read source file")]
    Source,
    /// The relative path is empty or escapes the destination root.
    #[display("invalid destination path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// The cancellation token fired before the upload finished.
    #[display("upload cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed. Nothing in updrop retries
    /// automatically; this is for whoever offers a manual retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Io => true,
            Self::Server { status, .. } => *status >= 500,
            Self::Source | Self::InvalidPath(_) | Self::Cancelled => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Network("network unreachable".to_string()), "network error: network unreachable")]
    #[case(ErrorKind::Server { status: 413, message: "too large".to_string() }, "server error 413: too large")]
    #[case(ErrorKind::Cancelled, "upload cancelled")]
    fn error_kind_display(#[case] kind: ErrorKind, #[case] expected: &str) {
        assert_eq!(kind.to_string(), expected);
    }

    #[rstest]
    #[case(ErrorKind::Network(String::new()), true)]
    #[case(ErrorKind::Server { status: 503, message: String::new() }, true)]
    #[case(ErrorKind::Server { status: 400, message: String::new() }, false)]
    #[case(ErrorKind::Cancelled, false)]
    fn retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }
}
