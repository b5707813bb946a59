//! Flattening a selection into `(file, relative path)` pairs.
//!
//! [`walk`] does the tree-aware traversal, [`flatten`] is the fallback for
//! platforms without tree entries, and [`collect`] picks between the two.

use crate::entry::{Entry, EntryTree, SEPARATOR, SelectionPayload, SourceFile, TreeEntry, WalkedFile};
use crate::error::Result;
use tracing::{debug, warn};

/// Walks every item of `payload` depth-first, returning one [`WalkedFile`]
/// per file found (directories themselves produce nothing).
///
/// Returns [`None`] without traversing anything if the tree can't resolve an
/// entry for *any* item; the caller is expected to fall back to [`flatten`]
/// for the whole selection.
///
/// A directory whose listing fails is dropped as a whole (including children
/// already paged in), siblings carry on. The same goes for a single file entry
/// that can't be opened. Empty directories simply contribute no files.
pub async fn walk<T: EntryTree>(tree: &T, payload: &SelectionPayload<T::Item>) -> Option<Vec<WalkedFile<T::File>>> {
    let mut roots = Vec::with_capacity(payload.len());
    for item in payload.items() {
        match tree.resolve(item).await {
            Some(entry) => roots.push(entry),
            None => {
                debug!(items = payload.len(), "Entry resolution unavailable; tree walk unsupported");
                return None;
            },
        }
    }
    let mut files = Vec::new();
    for entry in roots {
        visit(tree, entry, "", &mut files).await;
    }
    Some(files)
}

/// Treats every item as a plain file with a relative path equal to its name.
/// Items that have no plain file (e.g. directories) are skipped.
pub async fn flatten<T: EntryTree>(tree: &T, payload: &SelectionPayload<T::Item>) -> Vec<WalkedFile<T::File>> {
    let mut files = Vec::with_capacity(payload.len());
    for item in payload.items() {
        match tree.plain_file(item).await {
            Some(file) => {
                let relative_path = file.name().to_string();
                files.push(WalkedFile { file, relative_path });
            },
            None => warn!("Selected item has no plain file; skipping"),
        }
    }
    files
}

/// [`walk`] the payload, falling back to [`flatten`] when tree traversal is
/// unsupported.
pub async fn collect<T: EntryTree>(tree: &T, payload: &SelectionPayload<T::Item>) -> Vec<WalkedFile<T::File>> {
    match walk(tree, payload).await {
        Some(files) => files,
        None => flatten(tree, payload).await,
    }
}

async fn visit<T: EntryTree>(tree: &T, entry: TreeEntry<T>, prefix: &str, out: &mut Vec<WalkedFile<T::File>>) {
    match entry {
        Entry::File { name, handle } => match tree.open_file(&handle).await {
            Ok(file) => out.push(WalkedFile { file, relative_path: format!("{prefix}{name}") }),
            Err(e) => warn!(path = %format!("{prefix}{name}"), error = %&*e, "Dropping unreadable file entry"),
        },
        Entry::Directory { name, handle } => {
            let prefix = format!("{prefix}{name}{SEPARATOR}");
            let children = match read_children(tree, &handle).await {
                Ok(children) => children,
                Err(e) => {
                    warn!(path = %prefix, error = %&*e, "Dropping directory branch that failed to list");
                    return;
                },
            };
            for child in children {
                // Recursive async needs the indirection.
                Box::pin(visit(tree, child, &prefix, out)).await;
            }
        },
    }
}

/// Reads pages until the tree returns an empty one. A single page is never
/// assumed to be the complete listing.
async fn read_children<T: EntryTree>(tree: &T, handle: &T::DirHandle) -> Result<Vec<TreeEntry<T>>> {
    let mut reader = tree.open_dir(handle).await?;
    let mut children = Vec::new();
    loop {
        let page = tree.read_page(&mut reader).await?;
        if page.is_empty() {
            break;
        }
        children.extend(page);
    }
    Ok(children)
}
