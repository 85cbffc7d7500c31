//! Metric names recorded by the client.
//!
//! The recorder is installed by whoever embeds the client (the API server
//! exports it at `/metrics`); without one the `metrics` macros are no-ops.

/// Binary frames received (counter).
pub const FRAMES_RECEIVED_TOTAL: &str = "livetap_frames_received_total";
/// Frames that failed to decode (counter).
pub const FRAME_DECODE_ERRORS_TOTAL: &str = "livetap_frame_decode_errors_total";
/// Acks written back to the server (counter).
pub const ACKS_SENT_TOTAL: &str = "livetap_acks_sent_total";
/// Events delivered to sinks (counter, labels: category).
pub const EVENTS_EMITTED_TOTAL: &str = "livetap_events_emitted_total";
/// Messages dropped before delivery (counter, labels: reason).
pub const EVENTS_DROPPED_TOTAL: &str = "livetap_events_dropped_total";
/// Successful socket opens (counter).
pub const CONNECTIONS_TOTAL: &str = "livetap_connections_total";
/// Failed connection attempts (counter, labels: category).
pub const CONNECT_FAILURES_TOTAL: &str = "livetap_connect_failures_total";
/// Reconnects after a session closed (counter).
pub const RECONNECTS_TOTAL: &str = "livetap_reconnects_total";
/// Sessions force-closed by the silence watchdog (counter).
pub const WATCHDOG_RESTARTS_TOTAL: &str = "livetap_watchdog_restarts_total";
/// Failed relay attempts (counter).
pub const RELAY_FAILURES_TOTAL: &str = "livetap_relay_failures_total";
