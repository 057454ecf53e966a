use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

/// Downloaded images waiting in the temp dir. Only files inside that dir are
/// ever deleted.
#[derive(Debug, Clone)]
pub(super) struct TempFiles {
    dir: PathBuf,
}

impl TempFiles {
    pub(super) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub(super) async fn ensure_dir(&self) -> Result<(), io::Error> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Canonical path of `local_ref` when it names an existing file directly
    /// inside the temp dir. Symlinks and `..` are resolved before the check.
    pub(super) async fn resolve(&self, local_ref: &str) -> Option<PathBuf> {
        let dir = tokio::fs::canonicalize(&self.dir).await.ok()?;
        let path = tokio::fs::canonicalize(Path::new(local_ref)).await.ok()?;
        if path.parent() != Some(dir.as_path()) {
            return None;
        }
        let metadata = tokio::fs::metadata(&path).await.ok()?;
        metadata.is_file().then_some(path)
    }

    /// Delete a consumed or dropped image file.
    pub(super) async fn release(&self, local_ref: &str) {
        let Some(path) = self.resolve(local_ref).await else {
            debug!("leaving {} in place; not a file in the temp dir", local_ref);
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("removed temp file {}", local_ref),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to remove temp file {}: {}", local_ref, err),
        }
    }

    /// Remove files last modified more than `max_age` ago.
    pub(super) async fn sweep_older_than(&self, max_age: Duration) -> Result<usize, io::Error> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified()?;
            if modified < cutoff {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
