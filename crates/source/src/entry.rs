//! Platform abstractions consumed by the walker.
//!
//! A drop or picker action hands over a list of opaque items. Depending on the
//! platform, each item can be turned into a tree [`Entry`] (a file or a
//! directory that still has to be read) and/or a plain file. [`EntryTree`]
//! is the seam where a platform plugs its read API in.

use crate::error::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

pub type BoxAsyncRead = Box<dyn AsyncRead + Send + Unpin + 'static>;

/// Path separator used in every relative path produced by this crate,
/// independent of the host platform.
pub const SEPARATOR: char = '/';

/// A binary file selected for upload.
///
/// Name and size are captured when the handle is created and never change
/// afterwards; the contents are only read by a transport.
#[async_trait]
pub trait SourceFile: Send + Sync + 'static {
    /// Leaf name of the file (no directory components).
    fn name(&self) -> &str;

    /// Byte length of the file at the time the handle was resolved.
    fn size(&self) -> u64;

    /// Open the file contents for a streaming read.
    async fn reader(&self) -> Result<BoxAsyncRead>;
}

/// A tree entry: either a file or a directory whose children have not been
/// read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<F, D> {
    File { name: String, handle: F },
    Directory { name: String, handle: D },
}
impl<F, D> Entry<F, D> {
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } => name,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}

/// A platform's hierarchical read API.
///
/// # Pagination
/// [`read_page`](Self::read_page) returns *at most* a bounded page of
/// children per call. An empty page is the only end-of-listing signal; a
/// short page is not.
#[async_trait]
pub trait EntryTree: Send + Sync {
    /// A top-level item of a selection payload.
    type Item: Send + Sync;
    type FileHandle: Send + Sync;
    type DirHandle: Send + Sync;
    /// Cursor over the children of one directory.
    type Reader: Send;
    type File: SourceFile;

    /// Resolve a top-level item to a tree entry. Returns [`None`] when the
    /// platform can't provide entries for this item.
    async fn resolve(&self, item: &Self::Item) -> Option<Entry<Self::FileHandle, Self::DirHandle>>;

    /// The item as a plain file, for platforms (or items) without tree
    /// support. Directories have no plain file.
    async fn plain_file(&self, item: &Self::Item) -> Option<Self::File>;

    /// Resolve a file entry to the underlying binary file.
    async fn open_file(&self, handle: &Self::FileHandle) -> Result<Self::File>;

    /// Start reading the children of a directory entry.
    async fn open_dir(&self, handle: &Self::DirHandle) -> Result<Self::Reader>;

    /// Fetch the next page of children. Returns an empty page once the
    /// listing is exhausted.
    async fn read_page(&self, reader: &mut Self::Reader) -> Result<Vec<Entry<Self::FileHandle, Self::DirHandle>>>;
}

/// Shorthand for the entry type of a given tree.
pub type TreeEntry<T> = Entry<<T as EntryTree>::FileHandle, <T as EntryTree>::DirHandle>;

/// The raw payload of a drop or picker action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPayload<I> {
    items: Vec<I>,
}
impl<I> SelectionPayload<I> {
    pub fn new(items: impl IntoIterator<Item = I>) -> Self {
        Self { items: items.into_iter().collect() }
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
impl<I> From<Vec<I>> for SelectionPayload<I> {
    fn from(items: Vec<I>) -> Self {
        Self { items }
    }
}
impl<I> FromIterator<I> for SelectionPayload<I> {
    fn from_iter<It: IntoIterator<Item = I>>(iter: It) -> Self {
        Self::new(iter)
    }
}

/// A file discovered in a selection, paired with its path relative to the
/// root of the selection.
#[derive(Debug, Clone)]
pub struct WalkedFile<F> {
    pub file: F,
    pub relative_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_name() {
        let file: Entry<(), ()> = Entry::File { name: "a.png".to_string(), handle: () };
        let dir: Entry<(), ()> = Entry::Directory { name: "Photos".to_string(), handle: () };
        assert_eq!(file.name(), "a.png");
        assert!(!file.is_directory());
        assert_eq!(dir.name(), "Photos");
        assert!(dir.is_directory());
    }

    #[test]
    fn payload_keeps_order() {
        let payload: SelectionPayload<&str> = ["b", "a", "c"].into_iter().collect();
        assert_eq!(payload.items(), &["b", "a", "c"]);
        assert_eq!(payload.len(), 3);
        assert!(SelectionPayload::<&str>::new([]).is_empty());
    }
}
