// Size poller: rotate once the output file reaches a threshold

use super::Shutdown;
use crate::activity::ActivityLog;
use crate::error::{fail_fast, Result};
use crate::rotate::RotationEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One size check of the output file.
///
/// A failed stat is logged and skipped (the file may be mid-swap). A failed
/// rotation is returned to the caller, which treats it as fatal: an operator
/// must find out rather than watch the file grow unbounded.
pub async fn poll_once(
    engine: &RotationEngine,
    output_path: &Path,
    threshold_bytes: u64,
    activity: &ActivityLog,
) -> Result<()> {
    let size = match tokio::fs::metadata(output_path).await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            activity.record(
                "size check cannot stat output file",
                &format!("{}: {}", output_path.display(), e),
            );
            return Ok(());
        }
    };

    if size >= threshold_bytes {
        activity.record(
            "size threshold reached",
            &format!("{} >= {} bytes", size, threshold_bytes),
        );
        engine.rotate().await?;
    }

    Ok(())
}

/// Spawn the size poller task
pub fn spawn_size_poller(
    engine: Arc<RotationEngine>,
    output_path: PathBuf,
    threshold_bytes: u64,
    scan_interval: Duration,
    shutdown: Shutdown,
    activity: ActivityLog,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        activity.record(
            "tracking output file size",
            &format!("rotate at {} bytes", threshold_bytes),
        );
        loop {
            if !shutdown.is_active() {
                if let Err(e) = poll_once(&engine, &output_path, threshold_bytes, &activity).await {
                    activity.record("size-based rotation failed", &e.to_string());
                    fail_fast("Size-based rotation failed", &e);
                }
            }
            tokio::time::sleep(scan_interval).await;
        }
    })
}
