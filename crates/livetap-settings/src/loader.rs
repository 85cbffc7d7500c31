//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LivetapSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `LIVETAP_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::LivetapSettings;

/// Resolve the path to the settings file (`~/.livetap/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".livetap").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LivetapSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<LivetapSettings> {
    let defaults = serde_json::to_value(LivetapSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: LivetapSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning and the file/default value
/// stays in effect.
pub fn apply_env_overrides(settings: &mut LivetapSettings) {
    // ── Room ────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("LIVETAP_LIVE_ID") {
        settings.room.live_id = v;
    }

    // ── Gate / timing ───────────────────────────────────────────────
    if let Some(v) = read_env_u64("LIVETAP_CHAT_INTERVAL_MS", 0, 3_600_000) {
        settings.gate.chat_interval_ms = v;
    }
    if let Some(v) = read_env_u64("LIVETAP_ROOM_ENTRY_INTERVAL_MS", 0, 3_600_000) {
        settings.gate.room_entry_interval_ms = v;
    }
    if let Some(v) = read_env_u64("LIVETAP_SILENCE_THRESHOLD_MS", 0, 86_400_000) {
        settings.timing.silence_threshold_ms = v;
    }

    // ── Relay ───────────────────────────────────────────────────────
    if let Some(v) = read_env_string("LIVETAP_RELAY_URL") {
        settings.relay.server_url = v;
    }
    if let Some(v) = read_env_string("LIVETAP_RELAY_TOKEN") {
        settings.relay.token = Some(v);
    }
    if let Some(v) = read_env_string("LIVETAP_RELAY_USERNAME") {
        settings.relay.username = Some(v);
    }

    // ── Signer / API / logging ──────────────────────────────────────
    if let Some(v) = read_env_string("LIVETAP_SIGNER_SCRIPT") {
        settings.signer.script_path = v;
    }
    if let Some(v) = read_env_bool("LIVETAP_API_ENABLED") {
        settings.api.enabled = v;
    }
    if let Some(v) = read_env_u16("LIVETAP_API_PORT", 1, 65535) {
        settings.api.port = v;
    }
    if let Some(v) = read_env_string("LIVETAP_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"timing": {"retryDelayMs": 5000, "maxRetries": 5}});
        let source = serde_json::json!({"timing": {"maxRetries": 9}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["timing"]["maxRetries"], 9);
        assert_eq!(merged["timing"]["retryDelayMs"], 5000);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    #[test]
    fn merge_new_keys_added() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"b": 2});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.timing.max_retries, 5);
        assert_eq!(settings.relay.max_attempts, 3);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"room": {"liveId": "261378947940"}, "gate": {"chatIntervalMs": 3000}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.room.live_id, "261378947940");
        assert_eq!(settings.gate.chat_interval_ms, 3000);
        assert_eq!(settings.gate.room_entry_interval_ms, 0);
        assert_eq!(settings.room.root_url, "https://live.douyin.com/");
    }

    #[test]
    fn load_relay_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"relay": {"serverUrl": "http://backend:9000", "token": "abc", "username": "op"}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.relay.server_url, "http://backend:9000");
        assert_eq!(settings.relay.token.as_deref(), Some("abc"));
        assert_eq!(settings.relay.username.as_deref(), Some("op"));
        assert_eq!(settings.relay.max_attempts, 3);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"api": {"port": "not-a-port"}}"#).unwrap();

        assert!(load_settings_from_path(&path).is_err());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "ON"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("5050", 1, 65535), Some(5050));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("99999", 1, 65535), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("0", 0, 3_600_000), Some(0));
        assert_eq!(parse_u64_range("3000", 0, 3_600_000), Some(3000));
        assert_eq!(parse_u64_range("3600001", 0, 3_600_000), None);
        assert_eq!(parse_u64_range("-1", 0, 3_600_000), None);
        assert_eq!(parse_u64_range("abc", 0, 3_600_000), None);
    }
}
