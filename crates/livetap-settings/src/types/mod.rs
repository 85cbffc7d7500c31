//! Settings types.
//!
//! All structs use `#[serde(rename_all = "camelCase", default)]` so a partial
//! JSON file fills the gaps from compiled defaults.

mod connection;
mod service;

pub use connection::{DEFAULT_USER_AGENT, PushSettings, RoomSettings, SignerSettings, TimingSettings};
pub use service::{ApiSettings, GateSettings, LogFormat, LoggingSettings, RelaySettings};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LivetapSettings {
    /// Which room to watch and how to reach its pages.
    pub room: RoomSettings,
    /// Push endpoint and device identifiers.
    pub push: PushSettings,
    /// External signing script.
    pub signer: SignerSettings,
    /// Heartbeat, watchdog and retry timing.
    pub timing: TimingSettings,
    /// Per-category emission throttling.
    pub gate: GateSettings,
    /// Downstream relay (backend push).
    pub relay: RelaySettings,
    /// Local HTTP API.
    pub api: ApiSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl LivetapSettings {
    /// Check values that cannot be expressed by the type system.
    pub fn validate(&self) -> Result<()> {
        if self.room.live_id.trim().is_empty() {
            return Err(SettingsError::InvalidValue("room.liveId is empty".into()));
        }
        if !self.room.live_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SettingsError::InvalidValue(format!(
                "room.liveId must be alphanumeric, got '{}'",
                self.room.live_id
            )));
        }
        if self.timing.max_retries == 0 {
            return Err(SettingsError::InvalidValue(
                "timing.maxRetries must be at least 1".into(),
            ));
        }
        if self.timing.heartbeat_interval_ms == 0 || self.timing.watchdog_tick_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "timing intervals must be positive".into(),
            ));
        }
        if self.relay.max_attempts == 0 {
            return Err(SettingsError::InvalidValue(
                "relay.maxAttempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
