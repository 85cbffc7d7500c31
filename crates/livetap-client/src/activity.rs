//! Last-activity clock shared between the session and the watchdog.

use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

/// When inbound traffic was last seen.
///
/// Written by the session on socket open and on every data frame; read by
/// the watchdog. Pongs do not count as activity.
#[derive(Debug)]
pub struct ActivityClock {
    last: Mutex<Instant>,
}

impl ActivityClock {
    /// Clock that starts at `now`.
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        *self.last.lock() = Instant::now();
    }

    /// Last recorded activity.
    pub fn last(&self) -> Instant {
        *self.last.lock()
    }

    /// Time since the last activity.
    pub fn silent_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last())
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}
