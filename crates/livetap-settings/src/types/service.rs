//! Throttling, relay, API and logging settings.

use serde::{Deserialize, Serialize};

/// Minimum interval between emitted events, per category (0 = unthrottled).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateSettings {
    /// Chat messages.
    pub chat_interval_ms: u64,
    /// Room-entry messages.
    pub room_entry_interval_ms: u64,
}

/// Downstream backend that receives every emitted event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Backend base URL; events go to `{serverUrl}/live-messages/push`.
    pub server_url: String,
    /// Backend account name attached to each record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Backend credential sent as `Authorization`. The client does not start
    /// without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Attempts per event.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_delay_ms: u64,
    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8081".into(),
            username: None,
            token: None,
            max_attempts: 3,
            retry_delay_ms: 2_000,
            timeout_ms: 5_000,
        }
    }
}

/// Local HTTP API serving the latest event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Whether to start the API at all.
    pub enabled: bool,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".into(),
            port: 5050,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Compact,
    /// JSON lines.
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_defaults_match_backend_contract() {
        let relay = RelaySettings::default();
        assert_eq!(relay.server_url, "http://localhost:8081");
        assert_eq!(relay.retry_delay_ms, 2_000);
        assert_eq!(relay.timeout_ms, 5_000);
    }

    #[test]
    fn relay_omits_missing_credentials() {
        let json = serde_json::to_value(RelaySettings::default()).unwrap();
        assert!(json.get("token").is_none());
        assert!(json.get("username").is_none());
    }

    #[test]
    fn log_format_serde() {
        let fmt: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(fmt, LogFormat::Json);
        assert_eq!(serde_json::to_string(&LogFormat::Compact).unwrap(), "\"compact\"");
    }

    #[test]
    fn gate_defaults_unthrottled() {
        let gate = GateSettings::default();
        assert_eq!(gate.chat_interval_ms, 0);
        assert_eq!(gate.room_entry_interval_ms, 0);
    }
}
