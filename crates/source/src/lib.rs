//! Turning a drop or picker selection into a flat list of files.
//!
//! A selection may contain plain files or platform tree entries pointing at
//! whole folder hierarchies. [`walk`] flattens the latter into
//! `(file, relative path)` pairs, reading every directory page by page until
//! the platform reports an empty page.

mod entry;
pub mod error;
pub mod tree;
mod walk;

pub use crate::entry::{BoxAsyncRead, Entry, EntryTree, SEPARATOR, SelectionPayload, SourceFile, TreeEntry, WalkedFile};
pub use crate::walk::{collect, flatten, walk};
