//! Runtime configuration of a [`LiveClient`](crate::LiveClient).

use std::time::Duration;

use livetap_settings::{LivetapSettings, PushSettings, SignerSettings, TimingSettings, DEFAULT_USER_AGENT};
use tracing::warn;

/// Everything a client needs, with intervals as [`Duration`]s.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// External room handle.
    pub live_id: String,
    /// Site root (ends with `/`).
    pub root_url: String,
    /// User agent for page requests and the socket handshake.
    pub user_agent: String,
    /// Push endpoint and device identity.
    pub push: PushSettings,
    /// External signer.
    pub signer: SignerSettings,
    /// Keepalive ping interval.
    pub heartbeat_interval: Duration,
    /// Watchdog tick.
    pub watchdog_tick: Duration,
    /// Silence before a forced reconnect; zero disables the watchdog.
    pub silence_threshold: Duration,
    /// Delay between connection attempts.
    pub retry_delay: Duration,
    /// Consecutive failed attempts before giving up.
    pub max_retries: u32,
    /// Initial minimum interval between chat events.
    pub chat_interval: Duration,
    /// Initial minimum interval between room-entry events.
    pub room_entry_interval: Duration,
    /// Backend credential; the client refuses to start without one.
    pub credential: Option<String>,
}

impl ClientConfig {
    /// Default configuration for `live_id`.
    pub fn new(live_id: impl Into<String>) -> Self {
        let mut settings = LivetapSettings::default();
        settings.room.live_id = live_id.into();
        Self::from_settings(&settings)
    }

    /// Configuration from loaded settings.
    pub fn from_settings(settings: &LivetapSettings) -> Self {
        let timing = &settings.timing;
        Self {
            live_id: settings.room.live_id.clone(),
            root_url: settings.room.root_url.clone(),
            user_agent: if settings.room.user_agent.is_empty() {
                DEFAULT_USER_AGENT.to_string()
            } else {
                settings.room.user_agent.clone()
            },
            push: settings.push.clone(),
            signer: settings.signer.clone(),
            heartbeat_interval: Duration::from_millis(timing.heartbeat_interval_ms),
            watchdog_tick: Duration::from_millis(timing.watchdog_tick_ms),
            silence_threshold: Duration::from_millis(timing.silence_threshold_ms),
            retry_delay: Duration::from_millis(timing.retry_delay_ms),
            max_retries: timing.max_retries,
            chat_interval: Duration::from_millis(settings.gate.chat_interval_ms),
            room_entry_interval: Duration::from_millis(settings.gate.room_entry_interval_ms),
            credential: settings.relay.token.clone().filter(|t| !t.is_empty()),
        }
    }

    /// Replace zero periods, which would stall a ticking task, with the
    /// defaults.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let defaults = TimingSettings::default();
        if self.heartbeat_interval.is_zero() {
            warn!("zero heartbeat interval, using the default");
            self.heartbeat_interval = Duration::from_millis(defaults.heartbeat_interval_ms);
        }
        if self.watchdog_tick.is_zero() {
            warn!("zero watchdog tick, using the default");
            self.watchdog_tick = Duration::from_millis(defaults.watchdog_tick_ms);
        }
        self
    }
}
