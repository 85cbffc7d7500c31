//! Push endpoint query parameters.

use std::fmt::Write as _;

use livetap_settings::PushSettings;

const BROWSER_VERSION: &str = "5.0%20(Windows%20NT%2010.0;%20Win64;%20x64)%20AppleWebKit/537.36%20(KHTML,\
%20like%20Gecko)%20Chrome/126.0.0.0%20Safari/537.36";

/// Ordered query parameters for one connection attempt.
///
/// Rebuilt for every attempt so the room id, cursor and timestamps are
/// always fresh. Values are emitted verbatim; the endpoint expects the
/// literal separators (`|`, `:`) in `internal_ext`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionParameters {
    pairs: Vec<(&'static str, String)>,
}

impl ConnectionParameters {
    /// Parameters for `room_id`, stamped with `now_ms`.
    pub fn build(push: &PushSettings, room_id: &str, now_ms: u64) -> Self {
        let did = &push.user_unique_id;
        let internal_ext = format!(
            "internal_src:dim|wss_push_room_id:{room_id}|wss_push_did:{did}\
             |first_req_ms:{now_ms}|fetch_time:{now_ms}|seq:1|wss_info:0-{now_ms}-0-0|wrds_v:0"
        );
        let cursor = format!("d-1_u-1_fh-0_t-{now_ms}_r-1");

        let pairs = vec![
            ("app_name", "douyin_web".to_string()),
            ("version_code", push.version_code.clone()),
            ("webcast_sdk_version", push.sdk_version.clone()),
            ("update_version_code", push.sdk_version.clone()),
            ("compress", "gzip".to_string()),
            ("device_platform", "web".to_string()),
            ("cookie_enabled", "true".to_string()),
            ("screen_width", "1536".to_string()),
            ("screen_height", "864".to_string()),
            ("browser_language", "zh-CN".to_string()),
            ("browser_platform", "Win32".to_string()),
            ("browser_name", "Mozilla".to_string()),
            ("browser_version", BROWSER_VERSION.to_string()),
            ("browser_online", "true".to_string()),
            ("tz_name", "Asia/Shanghai".to_string()),
            ("cursor", cursor),
            ("internal_ext", internal_ext),
            ("host", "https://live.douyin.com".to_string()),
            ("aid", "6383".to_string()),
            ("live_id", "1".to_string()),
            ("did_rule", "3".to_string()),
            ("endpoint", "live_pc".to_string()),
            ("support_wrds", "1".to_string()),
            ("user_unique_id", did.clone()),
            ("im_path", "/webcast/im/fetch/".to_string()),
            ("identity", "audience".to_string()),
            // Zero disables history replay on connect.
            ("need_persist_msg_count", "0".to_string()),
            ("insert_task_id", String::new()),
            ("live_reason", String::new()),
            ("room_id", room_id.to_string()),
            ("heartbeatDuration", "0".to_string()),
        ];
        Self { pairs }
    }

    /// Value of a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Unsigned endpoint URL.
    pub fn url(&self, endpoint: &str) -> String {
        let mut url = String::with_capacity(endpoint.len() + 1024);
        url.push_str(endpoint);
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            let _ = write!(url, "{key}={value}");
        }
        url
    }

    /// Endpoint URL with the signature appended.
    pub fn signed_url(&self, endpoint: &str, signature: &str) -> String {
        format!("{}&signature={signature}", self.url(endpoint))
    }
}
