//! [`EntryTree`](crate::EntryTree) implementations.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::{LocalFile, LocalReader, LocalTree};
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockFile, MockReader, MockTree};
