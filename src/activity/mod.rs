// Activity module - lifecycle event recording

use crate::error::{LogTeeError, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Collaborator that records key lifecycle events (rotations, trigger
/// acknowledgments, retention sweeps). A no-op unless an activity file
/// was configured.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    enabled: bool,
}

impl ActivityLog {
    /// An activity log that discards every event
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a lifecycle event with free-form details
    pub fn record(&self, event: &str, details: &str) {
        if self.enabled {
            if details.is_empty() {
                tracing::info!(target: "activity", "{}", event);
            } else {
                tracing::info!(target: "activity", details = %details, "{}", event);
            }
        }
    }
}

/// Install the global subscriber and build the activity collaborator.
///
/// With an activity path, events are appended to that file. Without one,
/// diagnostics go to stderr under `RUST_LOG` control and activity recording
/// is disabled; stdout stays reserved for the passthrough stream.
pub fn init(activity_path: Option<&Path>) -> Result<ActivityLog> {
    match activity_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    LogTeeError::ActivityLogError(format!(
                        "Cannot open activity log file {}: {}",
                        path.display(),
                        e
                    ))
                })?;

            tracing_subscriber::fmt()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .ok();

            Ok(ActivityLog { enabled: true })
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(std::io::stderr)
                .try_init()
                .ok();

            Ok(ActivityLog::disabled())
        }
    }
}
