// Control-file poller: request/acknowledge rotation protocol

use super::Shutdown;
use crate::activity::ActivityLog;
use crate::error::{fail_fast, LogTeeError, Result};
use crate::rotate::RotationEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Whether the trigger file currently holds a rotation request.
///
/// A request is exactly "1", with one trailing newline tolerated. Any other
/// content, and any read error, is no-request.
pub(crate) async fn should_trigger(trigger_path: &Path) -> bool {
    match tokio::fs::read_to_string(trigger_path).await {
        Ok(content) => content == "1" || content == "1\n" || content == "1\r\n",
        Err(_) => false,
    }
}

/// One scan of the trigger file.
///
/// A requested rotation runs to completion and its outcome is acknowledged
/// into the trigger file: "0" on success, "2" on failure. A rotation failure
/// here is recoverable; the external writer owns the retry policy. Failing to
/// write the acknowledgment is the fatal case: the lingering "1" would be
/// reread every scan, rotating all retained history away.
pub async fn poll_once(
    engine: &RotationEngine,
    trigger_path: &Path,
    activity: &ActivityLog,
) -> Result<()> {
    if !should_trigger(trigger_path).await {
        return Ok(());
    }

    activity.record(
        "rotation requested via trigger file",
        &trigger_path.display().to_string(),
    );

    let status = match engine.rotate().await {
        Ok(()) => "0",
        Err(e) => {
            tracing::warn!(error = %e, "requested rotation failed");
            activity.record("rotation failed", &e.to_string());
            "2"
        }
    };

    activity.record("acknowledging trigger", status);
    tokio::fs::write(trigger_path, status).await.map_err(|e| {
        LogTeeError::TriggerError(format!(
            "Cannot write status to {}: {}",
            trigger_path.display(),
            e
        ))
    })
}

/// Spawn the control-file poller task
pub fn spawn_control_poller(
    engine: Arc<RotationEngine>,
    trigger_path: PathBuf,
    scan_interval: Duration,
    shutdown: Shutdown,
    activity: ActivityLog,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        activity.record("tracking trigger file", &trigger_path.display().to_string());
        loop {
            if !shutdown.is_active() {
                if let Err(e) = poll_once(&engine, &trigger_path, &activity).await {
                    activity.record("shutting down to prevent data loss", &e.to_string());
                    fail_fast("Cannot acknowledge trigger file", &e);
                }
            }
            tokio::time::sleep(scan_interval).await;
        }
    })
}
