//! Per-category emission throttling.
//!
//! A sampling filter, not a debouncer: an event arriving before the
//! category's interval has elapsed since the last emitted one is dropped,
//! never queued or delayed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use livetap_core::EventCategory;
use tokio::time::{Duration, Instant};

/// Minimum intervals per category, tunable while the client runs.
#[derive(Debug, Default)]
pub struct RateLimits {
    chat_ms: AtomicU64,
    room_entry_ms: AtomicU64,
}

impl RateLimits {
    /// Limits with the given intervals (zero disables throttling).
    pub fn new(chat: Duration, room_entry: Duration) -> Self {
        Self {
            chat_ms: AtomicU64::new(millis(chat)),
            room_entry_ms: AtomicU64::new(millis(room_entry)),
        }
    }

    /// Current interval for `category`.
    pub fn interval(&self, category: EventCategory) -> Duration {
        Duration::from_millis(self.slot(category).load(Ordering::Relaxed))
    }

    /// Change the interval for `category`.
    pub fn set_interval(&self, category: EventCategory, interval: Duration) {
        self.slot(category).store(millis(interval), Ordering::Relaxed);
    }

    fn slot(&self, category: EventCategory) -> &AtomicU64 {
        match category {
            EventCategory::Chat => &self.chat_ms,
            EventCategory::RoomEntry => &self.room_entry_ms,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Remembers when each category last emitted.
#[derive(Debug)]
pub struct RateGate {
    limits: Arc<RateLimits>,
    last_emitted: HashMap<EventCategory, Instant>,
}

impl RateGate {
    /// Gate reading its intervals from `limits`.
    pub fn new(limits: Arc<RateLimits>) -> Self {
        Self {
            limits,
            last_emitted: HashMap::new(),
        }
    }

    /// Whether an event of `category` may be emitted at `now`; records
    /// `now` as the last emission when it may.
    pub fn allow(&mut self, category: EventCategory, now: Instant) -> bool {
        let interval = self.limits.interval(category);
        let allowed = interval.is_zero()
            || self
                .last_emitted
                .get(&category)
                .is_none_or(|last| now.saturating_duration_since(*last) >= interval);
        if allowed {
            let _ = self.last_emitted.insert(category, now);
        }
        allowed
    }
}
