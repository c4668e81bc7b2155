//! Process-wide send suppression after delivery failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Default suppression window after a failure.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30 * 60);

/// A shared gate that blocks outbound sends for a window after any failure.
///
/// The whole state is one atomic deadline (milliseconds past a base instant
/// captured at construction), so readers and writers exchange a single value
/// and never observe a torn update. Share it with `Arc`; one instance serves
/// every sender in the process. Starts open, nothing persists across
/// restarts.
///
/// `trigger` always resets the deadline to `now + duration`: a later call
/// with a shorter duration shortens a longer standing cooldown. Known quirk,
/// kept from the original behavior.
#[derive(Debug)]
pub struct CooldownGate {
    base: Instant,
    deadline_ms: AtomicU64,
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}

impl CooldownGate {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            deadline_ms: AtomicU64::new(0),
        }
    }

    /// Whether sends are currently suppressed.
    pub fn is_cooled_down(&self) -> bool {
        self.elapsed_ms() < self.deadline_ms.load(Ordering::Acquire)
    }

    /// Time left until the gate reopens; zero when open.
    pub fn remaining(&self) -> Duration {
        let deadline = self.deadline_ms.load(Ordering::Acquire);
        Duration::from_millis(deadline.saturating_sub(self.elapsed_ms()))
    }

    /// Suppresses sends until `now + duration`.
    pub fn trigger(&self, duration: Duration) {
        let deadline = self.elapsed_ms() + duration.as_millis() as u64;
        self.deadline_ms.store(deadline, Ordering::Release);
        debug!(secs = duration.as_secs(), "cooldown triggered");
    }

    /// Suppresses sends for the default window.
    pub fn trigger_default(&self) {
        self.trigger(DEFAULT_COOLDOWN);
    }

    fn elapsed_ms(&self) -> u64 {
        self.base.elapsed().as_millis() as u64
    }
}
