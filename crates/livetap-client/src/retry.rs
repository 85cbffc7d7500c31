//! Consecutive connection-failure accounting.

/// What to do after a failed connection attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait and try again; `attempt` failures so far.
    Retry {
        /// Consecutive failures including this one.
        attempt: u32,
    },
    /// The bound is reached; stop.
    GiveUp {
        /// Consecutive failures including this one.
        attempts: u32,
    },
}

/// Counts consecutive failed attempts, bounded by `max`.
///
/// Reset on every successful socket open.
#[derive(Clone, Debug)]
pub struct RetryState {
    failures: u32,
    max: u32,
}

impl RetryState {
    /// Counter that gives up after `max` consecutive failures (at least 1).
    pub fn new(max: u32) -> Self {
        Self {
            failures: 0,
            max: max.max(1),
        }
    }

    /// Consecutive failures so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Configured bound.
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Record one failed attempt.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.max {
            RetryDecision::GiveUp {
                attempts: self.failures,
            }
        } else {
            RetryDecision::Retry {
                attempt: self.failures,
            }
        }
    }

    /// Record a successful open.
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gives_up_on_fifth_failure() {
        let mut retry = RetryState::new(5);
        for attempt in 1..=4 {
            assert_eq!(retry.record_failure(), RetryDecision::Retry { attempt });
        }
        assert_eq!(retry.record_failure(), RetryDecision::GiveUp { attempts: 5 });
    }

    #[test]
    fn success_resets_counter() {
        let mut retry = RetryState::new(5);
        let _ = retry.record_failure();
        let _ = retry.record_failure();
        retry.reset();
        assert_eq!(retry.failures(), 0);
        for attempt in 1..=4 {
            assert_eq!(retry.record_failure(), RetryDecision::Retry { attempt });
        }
    }

    #[test]
    fn zero_max_is_clamped() {
        let mut retry = RetryState::new(0);
        assert_eq!(retry.max(), 1);
        assert_eq!(retry.record_failure(), RetryDecision::GiveUp { attempts: 1 });
    }
}
