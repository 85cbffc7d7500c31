//! Backlog suppression.

/// Drops messages that predate the current connection.
///
/// On connect the server may replay recent history; anything whose origin
/// timestamp is earlier than the moment the socket opened is treated as
/// backlog. A zero timestamp means "unknown" and always passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StalenessFilter {
    established_at_ms: u64,
}

impl StalenessFilter {
    /// Filter for a connection established at `established_at_ms`.
    pub const fn new(established_at_ms: u64) -> Self {
        Self { established_at_ms }
    }

    /// When the connection opened (epoch ms).
    pub const fn established_at_ms(&self) -> u64 {
        self.established_at_ms
    }

    /// Whether a message with origin `origin_ms` should be emitted.
    pub const fn emits(&self, origin_ms: u64) -> bool {
        origin_ms == 0 || origin_ms >= self.established_at_ms
    }
}
