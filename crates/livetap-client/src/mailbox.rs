//! Latest-event mailbox for polling consumers.

use livetap_core::LiveEvent;
use parking_lot::Mutex;

/// Single-slot, latest-wins store.
///
/// Every delivery replaces whatever is pending; [`Mailbox::take`] drains at
/// most one event. Consumers polling slower than events arrive see only the
/// newest one.
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Option<LiveEvent>>,
}

impl Mailbox {
    /// Empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `event`, discarding any pending one.
    pub fn put(&self, event: LiveEvent) {
        let mut slot = self.slot.lock();
        *slot = Some(event);
    }

    /// Remove and return the pending event.
    pub fn take(&self) -> Option<LiveEvent> {
        self.slot.lock().take()
    }

    /// Whether an event is pending.
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}
