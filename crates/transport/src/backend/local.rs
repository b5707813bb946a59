//! Local filesystem transport.
//!
//! "Uploads" into a destination directory. Useful for syncing a drop into a
//! mounted share, and as a real transport in integration tests.

use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{CancellationToken, Progress, ServerPath, Transport};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use updrop_source::SourceFile;

const CHUNK_SIZE: usize = 64 * 1024;

/// Copies files below a root directory, keeping their relative paths.
///
/// Data is streamed in chunks; progress is reported after each chunk and the
/// cancellation token is checked before each one. A partially written file
/// is removed on cancellation or failure.
///
/// # Examples
///
/// ```no_run
/// use updrop_transport::backend::LocalTransport;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = LocalTransport::new("share", "/mnt/share/uploads")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalTransport {
    name: String,
    root: PathBuf,
}

impl LocalTransport {
    /// Create a new local transport rooted at an absolute directory.
    ///
    /// The directory is created if it doesn't exist yet.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
        }
        if root.exists() && !root.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
        }
        // Use non-async here; it only happens once on construction and isn't
        // worth making the constructor async.
        std::fs::create_dir_all(&root).or_raise(|| ErrorKind::Io)?;
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn copy<F: SourceFile>(
        &self,
        file: &F,
        target: &Path,
        progress: &Progress,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Io)?;
        }
        let mut reader = file.reader().await.or_raise(|| ErrorKind::Source)?;
        let mut writer = fs::File::create(target).await.or_raise(|| ErrorKind::Io)?;
        let total = file.size();
        let mut sent = 0u64;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            if cancel.is_cancelled() {
                exn::bail!(ErrorKind::Cancelled);
            }
            let read = reader.read(&mut buffer).await.or_raise(|| ErrorKind::Source)?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await.or_raise(|| ErrorKind::Io)?;
            sent += read as u64;
            progress.report_bytes(sent, total);
        }
        writer.flush().await.or_raise(|| ErrorKind::Io)?;
        progress.report(100);
        Ok(())
    }
}

#[async_trait]
impl<F: SourceFile> Transport<F> for LocalTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, file: F, relative_path: &str, progress: Progress, cancel: CancellationToken) -> Result<ServerPath> {
        let relative = validate_path(relative_path)?;
        let target = self.root.join(&relative);
        match self.copy(&file, &target, &progress, &cancel).await {
            Ok(()) => {
                debug!(transport = %self.name, path = %relative, bytes = file.size(), "Stored file");
                Ok(ServerPath::new(relative))
            },
            Err(e) => {
                // Don't leave truncated files behind. Silently ignore errors,
                // the file might never have been created.
                if let Err(cleanup) = fs::remove_file(&target).await
                    && cleanup.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(transport = %self.name, path = %relative, error = %cleanup, "Could not remove partial file");
                }
                Err(e)
            },
        }
    }
}
