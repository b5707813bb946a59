//! [`Transport`](crate::Transport) implementations.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalTransport;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{Behavior, MockTransport};
