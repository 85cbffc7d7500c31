//! Room status lookup.
//!
//! Purely informational: queried once when the client starts and after
//! every session close, and reported through the notifier.

use std::sync::Arc;

use livetap_core::{IdentityError, Notice, Notifier};
use reqwest::header::{COOKIE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::identity::{ResolvedIdentity, RoomIdentity};

#[derive(Debug, Deserialize)]
struct EnterResponse {
    data: Option<EnterData>,
}

#[derive(Debug, Deserialize)]
struct EnterData {
    #[serde(default)]
    room_status: i64,
    user: Option<Anchor>,
}

#[derive(Debug, Default, Deserialize)]
struct Anchor {
    #[serde(default)]
    id_str: String,
    #[serde(default)]
    nickname: String,
}

/// Broadcast state of a room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomStatus {
    /// Raw status code: 0 while live, non-zero once ended.
    pub code: i64,
    /// Broadcaster user id.
    pub anchor_id: String,
    /// Broadcaster display name.
    pub anchor_name: String,
}

impl RoomStatus {
    /// Whether the room is broadcasting.
    pub fn is_live(&self) -> bool {
        self.code == 0
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = if self.is_live() { "live" } else { "ended" };
        write!(f, "{} ({}): {state}", self.anchor_name, self.anchor_id)
    }
}

/// Status endpoint URL for a room.
pub fn status_url(root_url: &str, live_id: &str, room_id: &str) -> String {
    format!(
        "{root_url}webcast/room/web/enter/?aid=6383&app_name=douyin_web&live_id=1\
         &device_platform=web&language=zh-CN&enter_from=web_live&cookie_enabled=true\
         &screen_width=1536&screen_height=864&browser_language=zh-CN&browser_platform=Win32\
         &browser_name=Edge&browser_version=133.0.0.0&web_rid={live_id}&room_id_str={room_id}\
         &enter_source=&is_need_double_stream=false&insert_task_id=&live_reason=&msToken=&a_bogus="
    )
}

/// Query the room's broadcast status.
pub async fn fetch_room_status(identity: &RoomIdentity) -> Result<RoomStatus, IdentityError> {
    let ResolvedIdentity { token, room_id } = identity.resolve().await?;
    let url = status_url(identity.root_url(), identity.live_id(), &room_id);
    let http_err = |e: reqwest::Error| IdentityError::Http {
        url: url.clone(),
        message: e.to_string(),
    };

    let body: EnterResponse = identity
        .http()
        .get(&url)
        .header(USER_AGENT, identity.user_agent())
        .header(COOKIE, format!("ttwid={token};"))
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(http_err)?
        .json()
        .await
        .map_err(http_err)?;

    let data = body.data.ok_or_else(|| IdentityError::Http {
        url: url.clone(),
        message: "response carried no room data".into(),
    })?;
    let anchor = data.user.unwrap_or_default();
    Ok(RoomStatus {
        code: data.room_status,
        anchor_id: anchor.id_str,
        anchor_name: anchor.nickname,
    })
}

/// Look up the room status and report it as a notice.
pub async fn report_room_status(identity: Arc<RoomIdentity>, notifier: Arc<dyn Notifier>) {
    match fetch_room_status(&identity).await {
        Ok(status) => {
            debug!(live_id = identity.live_id(), code = status.code, "room status");
            notifier.notify(Notice::info(format!("room status: {status}")));
        }
        Err(err) => {
            warn!(live_id = identity.live_id(), error = %err, "room status lookup failed");
            notifier.notify(Notice::error(format!("room status unavailable: {err}")));
        }
    }
}
