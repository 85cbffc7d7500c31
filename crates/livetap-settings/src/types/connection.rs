//! Room, push endpoint, signer and timing settings.

use serde::{Deserialize, Serialize};

/// Desktop browser user agent presented to the platform.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Which room to watch.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// External room handle (the number in the room's web URL).
    pub live_id: String,
    /// Site root; the room page is `{rootUrl}{liveId}`.
    pub root_url: String,
    /// User agent for page requests and the socket handshake.
    pub user_agent: String,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            live_id: String::new(),
            root_url: "https://live.douyin.com/".into(),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

/// Push endpoint and the device identity sent in its query string.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushSettings {
    /// Push endpoint, without query string.
    pub endpoint: String,
    /// Device id reported as `user_unique_id` and `wss_push_did`.
    pub user_unique_id: String,
    /// Client `version_code`.
    pub version_code: String,
    /// Client `webcast_sdk_version` / `update_version_code`.
    pub sdk_version: String,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            endpoint: "wss://webcast5-ws-web-hl.douyin.com/webcast/im/push/v2/".into(),
            user_unique_id: "7319483754668557238".into(),
            version_code: "180800".into(),
            sdk_version: "1.0.14-beta.0".into(),
        }
    }
}

/// External signing script.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignerSettings {
    /// Path to the JavaScript file defining the signing function.
    pub script_path: String,
    /// JavaScript runtime executable.
    pub runtime: String,
    /// Name of the global function to call.
    pub function: String,
    /// Maximum time for one signing call.
    pub timeout_ms: u64,
}

impl Default for SignerSettings {
    fn default() -> Self {
        Self {
            script_path: "sign.js".into(),
            runtime: "node".into(),
            function: "get_sign".into(),
            timeout_ms: 10_000,
        }
    }
}

/// Keepalive, watchdog and reconnect timing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingSettings {
    /// Interval between keepalive pings.
    pub heartbeat_interval_ms: u64,
    /// Watchdog tick.
    pub watchdog_tick_ms: u64,
    /// Maximum silence before a forced reconnect (0 disables).
    pub silence_threshold_ms: u64,
    /// Delay before reconnecting after a failure or a close.
    pub retry_delay_ms: u64,
    /// Consecutive failed attempts before giving up.
    pub max_retries: u32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 5_000,
            watchdog_tick_ms: 1_000,
            silence_threshold_ms: 60_000,
            retry_delay_ms: 5_000,
            max_retries: 5,
        }
    }
}
