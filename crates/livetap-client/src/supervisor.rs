//! Silence watchdog.
//!
//! Pongs and heartbeats keep the socket nominally alive even after the
//! server has stopped pushing room traffic. The watchdog compares the
//! shared [`ActivityClock`] against a silence threshold and force-closes the
//! current session when it is exceeded; the client's reconnect path does
//! the rest.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use livetap_core::{Notice, Notifier};
use parking_lot::Mutex;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::activity::ActivityClock;
use crate::telemetry::WATCHDOG_RESTARTS_TOTAL;

/// Close handle of the currently open session, if any.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Mutex<Option<(u64, CancellationToken)>>,
    next_ticket: AtomicU64,
}

impl SessionSlot {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the close token of a newly opened session. The returned
    /// ticket identifies this registration for [`SessionSlot::clear`].
    pub fn set(&self, token: CancellationToken) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        *self.current.lock() = Some((ticket, token));
        ticket
    }

    /// Forget the session registered under `ticket`. A newer registration
    /// is left in place. Returns whether anything was removed.
    pub fn clear(&self, ticket: u64) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|(t, _)| *t == ticket) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Whether a session is registered.
    pub fn is_occupied(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Close the current session. Returns whether there was one to close;
    /// closing an already-closed session is a no-op.
    pub fn force_close(&self) -> bool {
        match self.current.lock().as_ref() {
            Some((_, token)) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}

/// Watches the activity clock and restarts silent sessions.
pub struct SessionSupervisor {
    clock: Arc<ActivityClock>,
    slot: Arc<SessionSlot>,
    threshold: Duration,
    tick: Duration,
    notifier: Arc<dyn Notifier>,
    handled: Option<Instant>,
}

impl SessionSupervisor {
    /// Watchdog over `slot`, ticking every `tick`. A zero `threshold`
    /// disables it.
    pub fn new(
        clock: Arc<ActivityClock>,
        slot: Arc<SessionSlot>,
        threshold: Duration,
        tick: Duration,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            clock,
            slot,
            threshold,
            tick,
            notifier,
            handled: None,
        }
    }

    /// Tick until `cancel` fires. Returns the number of forced restarts.
    pub async fn run(mut self, cancel: CancellationToken) -> u32 {
        let mut restarts = 0;
        if self.threshold.is_zero() {
            debug!("silence watchdog disabled");
            cancel.cancelled().await;
            return restarts;
        }

        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return restarts,
                _ = ticker.tick() => {
                    if self.check(Instant::now()) {
                        restarts += 1;
                    }
                }
            }
        }
    }

    /// One watchdog evaluation. Returns whether a session was closed.
    ///
    /// A silence episode is identified by the last-activity instant, so
    /// each episode triggers at most one close.
    pub fn check(&mut self, now: Instant) -> bool {
        if self.threshold.is_zero() {
            return false;
        }
        let last = self.clock.last();
        if self.handled == Some(last) {
            return false;
        }
        let silent = self.clock.silent_for(now);
        if silent < self.threshold {
            return false;
        }
        if !self.slot.force_close() {
            return false;
        }

        self.handled = Some(last);
        metrics::counter!(WATCHDOG_RESTARTS_TOTAL).increment(1);
        warn!(
            silent_ms = u64::try_from(silent.as_millis()).unwrap_or(u64::MAX),
            "no room traffic, forcing reconnect"
        );
        self.notifier.notify(Notice::error(format!(
            "no messages for {}s, restarting connection",
            silent.as_secs()
        )));
        true
    }
}
