//! In-memory entry tree for testing.

use crate::entry::{BoxAsyncRead, Entry, EntryTree, SEPARATOR, SourceFile};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_PAGE_SIZE: usize = 100;

enum Node {
    File(Arc<Vec<u8>>),
    Dir(Vec<(String, Node)>),
}

/// A file held entirely in memory.
#[derive(Debug, Clone)]
pub struct MockFile {
    name: String,
    data: Arc<Vec<u8>>,
}
impl MockFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), data: Arc::new(data.into()) }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[async_trait]
impl SourceFile for MockFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn reader(&self) -> Result<BoxAsyncRead> {
        Ok(Box::new(Cursor::new(self.data.as_ref().clone())))
    }
}

pub struct MockReader {
    children: Vec<Entry<String, String>>,
    failing: bool,
}

/// In-memory [`EntryTree`] for tests.
///
/// Items of a selection are the names of top-level nodes. Children are
/// reported in insertion order, `page_size` at a time, and every
/// [`read_page`](EntryTree::read_page) call is counted so tests can assert
/// that pagination was exhausted.
pub struct MockTree {
    root: Vec<(String, Node)>,
    page_size: usize,
    supported: bool,
    no_entries: HashSet<String>,
    failing: HashSet<String>,
    pages_read: AtomicUsize,
}

impl Default for MockTree {
    fn default() -> Self {
        Self {
            root: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            supported: true,
            no_entries: HashSet::new(),
            failing: HashSet::new(),
            pages_read: AtomicUsize::new(0),
        }
    }
}

impl MockTree {
    /// Add a file, creating parent directories as needed.
    ///
    /// Panics if a path component is already a file. If test setup is wrong,
    /// then the test should not pass.
    pub fn with_file(mut self, path: impl AsRef<str>, data: impl Into<Vec<u8>>) -> Self {
        let path = path.as_ref();
        let (parents, leaf) = match path.rsplit_once(SEPARATOR) {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, path),
        };
        let dir = match parents {
            Some(parents) => Self::dir_mut(&mut self.root, parents),
            None => &mut self.root,
        };
        dir.push((leaf.to_string(), Node::File(Arc::new(data.into()))));
        self
    }

    /// Add an (empty) directory, creating parents as needed.
    pub fn with_dir(mut self, path: impl AsRef<str>) -> Self {
        Self::dir_mut(&mut self.root, path.as_ref());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Pretend the platform has no tree entry support at all.
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Pretend entry resolution is unavailable for one top-level item.
    pub fn without_entries(mut self, item: impl Into<String>) -> Self {
        self.no_entries.insert(item.into());
        self
    }

    /// Make reading the children of `path` fail.
    pub fn fail_listing(mut self, path: impl Into<String>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Number of [`read_page`](EntryTree::read_page) calls made so far.
    pub fn pages_read(&self) -> usize {
        self.pages_read.load(Ordering::SeqCst)
    }

    fn dir_mut<'a>(mut dir: &'a mut Vec<(String, Node)>, path: &str) -> &'a mut Vec<(String, Node)> {
        for component in path.split(SEPARATOR).filter(|c| !c.is_empty()) {
            let index = match dir.iter().position(|(name, _)| name == component) {
                Some(index) => index,
                None => {
                    dir.push((component.to_string(), Node::Dir(Vec::new())));
                    dir.len() - 1
                },
            };
            dir = match &mut dir[index].1 {
                Node::Dir(children) => children,
                // The panic here is DELIBERATE, test setup is broken.
                Node::File(_) => panic!("MockTree: `{component}` in `{path}` is a file"),
            };
        }
        dir
    }

    fn node(&self, path: &str) -> Option<&Node> {
        let mut components = path.split(SEPARATOR);
        let first = components.next()?;
        let mut node = &self.root.iter().find(|(name, _)| name == first)?.1;
        for component in components {
            let Node::Dir(children) = node else {
                return None;
            };
            node = &children.iter().find(|(name, _)| name == component)?.1;
        }
        Some(node)
    }

    fn entry(name: &str, path: String, node: &Node) -> Entry<String, String> {
        match node {
            Node::File(_) => Entry::File { name: name.to_string(), handle: path },
            Node::Dir(_) => Entry::Directory { name: name.to_string(), handle: path },
        }
    }

    fn leaf(path: &str) -> &str {
        path.rsplit(SEPARATOR).next().unwrap_or(path)
    }
}

#[async_trait]
impl EntryTree for MockTree {
    type Item = String;
    type FileHandle = String;
    type DirHandle = String;
    type Reader = MockReader;
    type File = MockFile;

    async fn resolve(&self, item: &String) -> Option<Entry<String, String>> {
        if !self.supported || self.no_entries.contains(item) {
            return None;
        }
        self.node(item).map(|node| Self::entry(item, item.clone(), node))
    }

    async fn plain_file(&self, item: &String) -> Option<MockFile> {
        match self.node(item)? {
            Node::File(data) => Some(MockFile { name: item.clone(), data: data.clone() }),
            Node::Dir(_) => None,
        }
    }

    async fn open_file(&self, handle: &String) -> Result<MockFile> {
        match self.node(handle) {
            Some(Node::File(data)) => Ok(MockFile { name: Self::leaf(handle).to_string(), data: data.clone() }),
            Some(Node::Dir(_)) => exn::bail!(ErrorKind::Unreadable(handle.clone())),
            None => exn::bail!(ErrorKind::NotFound(PathBuf::from(handle))),
        }
    }

    async fn open_dir(&self, handle: &String) -> Result<MockReader> {
        let children = match self.node(handle) {
            Some(Node::Dir(children)) => children
                .iter()
                .map(|(name, node)| Self::entry(name, format!("{handle}{SEPARATOR}{name}"), node))
                .collect(),
            Some(Node::File(_)) => exn::bail!(ErrorKind::Listing(handle.clone())),
            None => exn::bail!(ErrorKind::NotFound(PathBuf::from(handle))),
        };
        Ok(MockReader { children, failing: self.failing.contains(handle) })
    }

    async fn read_page(&self, reader: &mut MockReader) -> Result<Vec<Entry<String, String>>> {
        self.pages_read.fetch_add(1, Ordering::SeqCst);
        if reader.failing {
            exn::bail!(ErrorKind::Listing("permission denied".to_string()));
        }
        let take = self.page_size.min(reader.children.len());
        Ok(reader.children.drain(..take).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn resolve_top_level_items() {
        let tree = MockTree::default().with_file("a.txt", b"a").with_dir("dir");
        assert!(matches!(tree.resolve(&"a.txt".to_string()).await, Some(Entry::File { .. })));
        assert!(matches!(tree.resolve(&"dir".to_string()).await, Some(Entry::Directory { .. })));
        assert!(tree.resolve(&"missing".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn pages_are_bounded() {
        let tree = MockTree::default().with_page_size(2).with_file("d/1", b"").with_file("d/2", b"").with_file("d/3", b"");
        let mut reader = tree.open_dir(&"d".to_string()).await.unwrap();
        assert_eq!(tree.read_page(&mut reader).await.unwrap().len(), 2);
        assert_eq!(tree.read_page(&mut reader).await.unwrap().len(), 1);
        assert!(tree.read_page(&mut reader).await.unwrap().is_empty());
        assert_eq!(tree.pages_read(), 3);
    }

    #[tokio::test]
    async fn file_contents_are_readable() {
        let tree = MockTree::default().with_file("d/file.txt", b"hello");
        let file = tree.open_file(&"d/file.txt".to_string()).await.unwrap();
        assert_eq!(file.name(), "file.txt");
        let mut buf = Vec::new();
        file.reader().await.unwrap().read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello");
    }

    #[tokio::test]
    async fn failing_listing() {
        let tree = MockTree::default().with_file("bad/x", b"").fail_listing("bad");
        let mut reader = tree.open_dir(&"bad".to_string()).await.unwrap();
        let err = tree.read_page(&mut reader).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Listing(_)));
    }

    #[test]
    #[should_panic(expected = "is a file")]
    fn file_as_directory_panics() {
        let _ = MockTree::default().with_file("a", b"").with_file("a/b", b"");
    }
}
