//! Config Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration source couldn't be read or parsed. The underlying
    /// figment error is attached as a child.
    #[display("could not load configuration")]
    Load,
    /// A value was read fine but is out of range.
    #[display("invalid configuration value: {_0}")]
    Invalid(#[error(not(source))] String),
}

impl ErrorKind {
    /// Configuration errors need a human to fix the file or environment.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
