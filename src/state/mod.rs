// File state module - the live output handle and its reopen flag

use crate::error::{LogTeeError, Result};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Owner of the live output file.
///
/// One lock guards both the open handle and the stale flag. The writer takes
/// it for the duration of a single chunk write; rotation takes it only for the
/// rename-and-recreate swap, so the writer is blocked as briefly as possible.
/// Callers never see the lock itself.
pub struct OutputState {
    path: PathBuf,
    inner: Mutex<OutputInner>,
}

struct OutputInner {
    file: File,
    /// Set by rotation after a swap; the next write reopens the handle
    stale: bool,
}

impl OutputState {
    /// Open the output file, appending or truncating per config
    pub async fn open(path: &Path, truncate_on_start: bool) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.create(true).write(true);
        if truncate_on_start {
            options.truncate(true);
        } else {
            options.append(true);
        }

        let file = options.open(path).await.map_err(|e| {
            LogTeeError::OutputFileError(format!("{}: {}", path.display(), e))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(OutputInner { file, stale: false }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one chunk to the live output file.
    ///
    /// Reopens the handle first if rotation swapped the file out since the
    /// last write.
    pub async fn write(&self, chunk: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.stale {
            inner.stale = false;
            inner.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| {
                    LogTeeError::OutputFileError(format!("{}: {}", self.path.display(), e))
                })?;
        }

        inner
            .file
            .write_all(chunk)
            .await
            .map_err(|e| LogTeeError::OutputFileError(format!("{}: {}", self.path.display(), e)))?;
        inner
            .file
            .flush()
            .await
            .map_err(|e| LogTeeError::OutputFileError(format!("{}: {}", self.path.display(), e)))?;

        Ok(())
    }

    /// Move the live output file aside and recreate it empty.
    ///
    /// Rename is fast, so the writer can continue almost immediately; the
    /// slow compress/copy work happens on the returned temp path outside this
    /// lock. A stray file already occupying a temp name is never overwritten.
    pub async fn swap(&self) -> Result<PathBuf> {
        let mut inner = self.inner.lock().await;

        inner
            .file
            .flush()
            .await
            .map_err(|e| LogTeeError::OutputFileError(format!("{}: {}", self.path.display(), e)))?;

        let temp_path = next_free_temp(&self.path).await;
        tokio::fs::rename(&self.path, &temp_path).await.map_err(|e| {
            LogTeeError::RotationError(format!(
                "Cannot move {} aside: {}",
                self.path.display(),
                e
            ))
        })?;

        // Recreate immediately so an empty output file exists even before the
        // writer's next chunk arrives. Failure here is tolerable: the writer
        // recreates the file itself when it reopens.
        if let Ok(empty) = File::create(&self.path).await {
            drop(empty);
        }

        inner.stale = true;
        Ok(temp_path)
    }
}

/// First unused `<path>.tmp.<n>` name, probing upward from 1
pub(crate) async fn next_free_temp(path: &Path) -> PathBuf {
    let mut index = 1u32;
    loop {
        let candidate = PathBuf::from(format!("{}.tmp.{}", path.display(), index));
        if tokio::fs::metadata(&candidate).await.is_err() {
            return candidate;
        }
        index += 1;
    }
}
