// Timer poller: unconditional rotation on a fixed schedule

use super::Shutdown;
use crate::activity::ActivityLog;
use crate::error::fail_fast;
use crate::rotate::RotationEngine;
use std::sync::Arc;
use std::time::Duration;

/// Spawn the timed rotation task.
///
/// The schedule is measured from process start, sleeping a full interval
/// before the first rotation; there is no wall-clock alignment. A failed
/// rotation here is fatal for the same reason as the size poller.
pub fn spawn_timer_poller(
    engine: Arc<RotationEngine>,
    timer_interval: Duration,
    shutdown: Shutdown,
    activity: ActivityLog,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        activity.record(
            "timed rotation active",
            &format!("every {:.1}s", timer_interval.as_secs_f64()),
        );
        loop {
            tokio::time::sleep(timer_interval).await;
            if shutdown.is_active() {
                continue;
            }
            if let Err(e) = engine.rotate().await {
                activity.record("timed rotation failed", &e.to_string());
                fail_fast("Timed rotation failed", &e);
            }
        }
    })
}
