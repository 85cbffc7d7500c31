//! `/health` endpoint.

use std::time::Instant;

use livetap_client::SessionPhase;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Room the client follows.
    pub live_id: String,
    /// Whether the client is ingesting.
    pub running: bool,
    /// Current push session phase.
    pub phase: SessionPhase,
}

/// Build a health response from the client's current state.
pub fn health_check(
    start_time: Instant,
    live_id: &str,
    running: bool,
    phase: SessionPhase,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        live_id: live_id.to_string(),
        running,
        phase,
    }
}
