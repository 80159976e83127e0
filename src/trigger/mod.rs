// Trigger module - periodic rotation request sources

pub mod control;
pub mod size;
pub mod timer;

pub use control::spawn_control_poller;
pub use size::spawn_size_poller;
pub use timer::spawn_timer_poller;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag set at shutdown so pollers stop requesting new rotations.
/// An already-running rotation still finishes under the engine's lock.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
