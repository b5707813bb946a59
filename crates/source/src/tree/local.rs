//! Local filesystem entry tree.
//!
//! Lets the walker run against real paths (a CLI argument list, a desktop
//! drop handler handing over paths, ...) using `tokio::fs` for async I/O.

use crate::entry::{BoxAsyncRead, Entry, EntryTree, SourceFile};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry, ReadDir};

const DEFAULT_PAGE_SIZE: usize = 100;

/// A file on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    size: u64,
}
impl LocalFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourceFile for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn reader(&self) -> Result<BoxAsyncRead> {
        let file = fs::File::open(&self.path).await.map_err(|e| map_io_error(e, &self.path))?;
        Ok(Box::new(file))
    }
}

/// Cursor over one directory's children.
#[derive(Debug)]
pub struct LocalReader {
    dir: PathBuf,
    entries: ReadDir,
}

/// [`EntryTree`] over the local filesystem.
///
/// Items are paths. Directory children are returned at most `page_size` at a
/// time, straight off an open [`ReadDir`], so listing a huge directory never
/// buffers more than one page inside the tree itself.
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
/// use updrop_source::{SelectionPayload, collect};
/// use updrop_source::tree::LocalTree;
///
/// # async fn example() {
/// let tree = LocalTree::default();
/// let files = collect(&tree, &SelectionPayload::new([PathBuf::from("/home/me/Photos")])).await;
/// for walked in files {
///     println!("{}", walked.relative_path);
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalTree {
    page_size: usize,
}
impl Default for LocalTree {
    fn default() -> Self {
        Self { page_size: DEFAULT_PAGE_SIZE }
    }
}
impl LocalTree {
    pub fn new(page_size: usize) -> Self {
        Self { page_size: page_size.max(1) }
    }

    fn file_name(path: &Path) -> Option<String> {
        path.file_name().map(|name| name.to_string_lossy().into_owned())
    }

    async fn local_file(path: &Path) -> Result<LocalFile> {
        let metadata = fs::metadata(path).await.map_err(|e| map_io_error(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::Unreadable(path.display().to_string()));
        }
        let Some(name) = Self::file_name(path) else {
            exn::bail!(ErrorKind::Unreadable(path.display().to_string()));
        };
        Ok(LocalFile { path: path.to_path_buf(), name, size: metadata.len() })
    }

    /// Symlinks are not followed (a link back to an ancestor would otherwise
    /// be walked forever). Anything that isn't a plain file or directory is
    /// skipped.
    async fn process_entry(entry: DirEntry) -> Result<Option<Entry<PathBuf, PathBuf>>> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| map_io_error(e, &path))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if metadata.is_dir() {
            return Ok(Some(Entry::Directory { name, handle: path }));
        }
        if metadata.is_file() {
            return Ok(Some(Entry::File { name, handle: path }));
        }
        Ok(None)
    }
}

#[async_trait]
impl EntryTree for LocalTree {
    type Item = PathBuf;
    type FileHandle = PathBuf;
    type DirHandle = PathBuf;
    type Reader = LocalReader;
    type File = LocalFile;

    async fn resolve(&self, item: &PathBuf) -> Option<Entry<PathBuf, PathBuf>> {
        let metadata = fs::metadata(item).await.ok()?;
        let name = Self::file_name(item)?;
        if metadata.is_dir() {
            Some(Entry::Directory { name, handle: item.clone() })
        } else if metadata.is_file() {
            Some(Entry::File { name, handle: item.clone() })
        } else {
            None
        }
    }

    async fn plain_file(&self, item: &PathBuf) -> Option<LocalFile> {
        Self::local_file(item).await.ok()
    }

    async fn open_file(&self, handle: &PathBuf) -> Result<LocalFile> {
        Self::local_file(handle).await
    }

    async fn open_dir(&self, handle: &PathBuf) -> Result<LocalReader> {
        let entries = fs::read_dir(handle).await.map_err(|e| map_io_error(e, handle))?;
        Ok(LocalReader { dir: handle.clone(), entries })
    }

    async fn read_page(&self, reader: &mut LocalReader) -> Result<Vec<Entry<PathBuf, PathBuf>>> {
        let mut page = Vec::with_capacity(self.page_size);
        // Skipped entries must not shorten a page to zero, an empty page
        // means the listing is finished.
        while page.len() < self.page_size {
            let entry = match reader.entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(map_io_error(e, &reader.dir).into()),
            };
            match Self::process_entry(entry).await {
                Ok(Some(entry)) => page.push(entry),
                Ok(None) => {},
                Err(e) => tracing::debug!(dir = %reader.dir.display(), error = %&*e, "Skipping unreadable entry"),
            }
        }
        Ok(page)
    }
}

fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
    match e.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
        _ => ErrorKind::Io(e),
    }
}
