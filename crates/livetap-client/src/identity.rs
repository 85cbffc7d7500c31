//! Room identity resolution.
//!
//! Two values are needed before the push socket can be opened: the anti-bot
//! `ttwid` token (a cookie set by the site root) and the numeric room id
//! (scraped from the room page). Both are fetched lazily, cached, and
//! dropped by [`RoomIdentity::invalidate`] at the start of every connection
//! attempt so a room id from an earlier broadcast is never reused.

use std::sync::{Arc, LazyLock};

use livetap_core::{IdentityError, Notice, Notifier};
use parking_lot::Mutex;
use rand::Rng;
use regex::Regex;
use reqwest::header::{COOKIE, SET_COOKIE, USER_AGENT};
use tracing::{debug, warn};

/// Matches the JSON-escaped `roomId` field embedded in the room page.
static ROOM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"roomId\\":\\"(\d+)\\""#).unwrap());

/// Length of the random `msToken` cookie value.
pub const MS_TOKEN_LEN: usize = 107;

const MS_TOKEN_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789=_";

/// Fixed nonce cookie the room page expects.
const AC_NONCE: &str = "0123407cc00a9e438deb4";

/// Random `msToken` of `len` characters from `[A-Za-z0-9=_]`.
pub fn ms_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(MS_TOKEN_ALPHABET[rng.random_range(0..MS_TOKEN_ALPHABET.len())]))
        .collect()
}

/// Token and room id resolved for one connection attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Anti-bot token; empty when the site did not set one.
    pub token: String,
    /// Numeric room id.
    pub room_id: String,
}

/// Lazily resolved identity of one room.
pub struct RoomIdentity {
    live_id: String,
    root_url: String,
    user_agent: String,
    http: reqwest::Client,
    notifier: Option<Arc<dyn Notifier>>,
    token: Mutex<Option<String>>,
    room_id: Mutex<Option<String>>,
}

impl RoomIdentity {
    /// Identity for `live_id` under `root_url` (which ends with `/`).
    pub fn new(
        live_id: impl Into<String>,
        root_url: impl Into<String>,
        user_agent: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            live_id: live_id.into(),
            root_url: root_url.into(),
            user_agent: user_agent.into(),
            http,
            notifier: None,
            token: Mutex::new(None),
            room_id: Mutex::new(None),
        }
    }

    /// Report a degraded token through `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// External room handle.
    pub fn live_id(&self) -> &str {
        &self.live_id
    }

    /// Site root.
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// User agent used for every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Shared HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Forget both cached values.
    pub fn invalidate(&self) {
        *self.token.lock() = None;
        *self.room_id.lock() = None;
    }

    /// Cached room id, if resolved.
    pub fn cached_room_id(&self) -> Option<String> {
        self.room_id.lock().clone()
    }

    /// Anti-bot token, fetched from the site root on first use.
    pub async fn token(&self) -> Result<String, IdentityError> {
        if let Some(token) = self.token.lock().clone() {
            return Ok(token);
        }

        let response = self
            .http
            .get(&self.root_url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.http_error(&self.root_url, &e))?;

        let token = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(ttwid_from_set_cookie)
            .ok_or(IdentityError::TokenMissing)?;

        debug!(live_id = %self.live_id, "resolved anti-bot token");
        *self.token.lock() = Some(token.clone());
        Ok(token)
    }

    /// Anti-bot token, or an empty string when it could not be fetched.
    ///
    /// The token is best effort: a missing cookie and a failed request both
    /// degrade to an empty value, reported through the notifier.
    pub async fn token_or_empty(&self) -> String {
        match self.token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(live_id = %self.live_id, error = %err, "anti-bot token unavailable, continuing without it");
                if let Some(notifier) = &self.notifier {
                    notifier.notify(Notice::error(format!(
                        "anti-bot token unavailable, continuing without it: {err}"
                    )));
                }
                String::new()
            }
        }
    }

    /// Numeric room id, scraped from the room page on first use. The page
    /// request carries `token`.
    async fn room_id(&self, token: &str) -> Result<String, IdentityError> {
        if let Some(room_id) = self.cached_room_id() {
            return Ok(room_id);
        }

        let url = format!("{}{}", self.root_url, self.live_id);
        let cookie = format!(
            "ttwid={token}&msToken={}; __ac_nonce={AC_NONCE}",
            ms_token(MS_TOKEN_LEN)
        );

        let body = self
            .http
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .header(COOKIE, cookie)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.http_error(&url, &e))?
            .text()
            .await
            .map_err(|e| self.http_error(&url, &e))?;

        let room_id = ROOM_ID_PATTERN
            .captures(&body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| IdentityError::RoomIdNotFound {
                live_id: self.live_id.clone(),
            })?;

        debug!(live_id = %self.live_id, %room_id, "resolved room id");
        *self.room_id.lock() = Some(room_id.clone());
        Ok(room_id)
    }

    /// Resolve token (best effort) and room id (required). The root page is
    /// fetched at most once per call.
    pub async fn resolve(&self) -> Result<ResolvedIdentity, IdentityError> {
        let token = self.token_or_empty().await;
        let room_id = self.room_id(&token).await?;
        Ok(ResolvedIdentity { token, room_id })
    }

    fn http_error(&self, url: &str, err: &reqwest::Error) -> IdentityError {
        warn!(live_id = %self.live_id, url, error = %err, "identity request failed");
        IdentityError::Http {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

fn ttwid_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let value = pair.strip_prefix("ttwid=")?;
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<script>self.__pace_f.push([1,"{\"state\":{\"roomStore\":{\"roomInfo\":{\"roomId\":\"7392091211001140287\",\"web_rid\":\"261378947940\"}}}}"])</script>"#;

    fn identity(server: &MockServer) -> RoomIdentity {
        RoomIdentity::new(
            "261378947940",
            format!("{}/", server.uri()),
            "test-agent",
            reqwest::Client::new(),
        )
    }

    async fn mount_root(server: &MockServer, set_cookie: Option<&str>) {
        let mut response = ResponseTemplate::new(200).set_body_string("<html></html>");
        if let Some(cookie) = set_cookie {
            response = response.insert_header("set-cookie", cookie);
        }
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[test]
    fn ms_token_shape() {
        let token = ms_token(MS_TOKEN_LEN);
        assert_eq!(token.len(), 107);
        assert!(token.bytes().all(|b| MS_TOKEN_ALPHABET.contains(&b)));
    }

    #[test]
    fn ms_tokens_differ() {
        assert_ne!(ms_token(MS_TOKEN_LEN), ms_token(MS_TOKEN_LEN));
    }

    #[test]
    fn parses_ttwid_cookie() {
        assert_eq!(
            ttwid_from_set_cookie("ttwid=1%7Cabc; Path=/; HttpOnly").as_deref(),
            Some("1%7Cabc")
        );
        assert_eq!(ttwid_from_set_cookie("other=1; Path=/"), None);
        assert_eq!(ttwid_from_set_cookie("ttwid=; Path=/"), None);
    }

    #[test]
    fn room_id_pattern_matches_escaped_json() {
        let caps = ROOM_ID_PATTERN.captures(PAGE).unwrap();
        assert_eq!(&caps[1], "7392091211001140287");
    }

    #[tokio::test]
    async fn resolves_token_and_room_id() {
        let server = MockServer::start().await;
        mount_root(&server, Some("ttwid=tok123; Path=/")).await;
        Mock::given(method("GET"))
            .and(path("/261378947940"))
            .and(header_regex("cookie", r"^ttwid=tok123&msToken=[A-Za-z0-9=_]{107}; __ac_nonce="))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let id = identity(&server);
        let resolved = id.resolve().await.unwrap();
        assert_eq!(resolved.token, "tok123");
        assert_eq!(resolved.room_id, "7392091211001140287");
        assert_eq!(id.cached_room_id().as_deref(), Some("7392091211001140287"));
    }

    #[tokio::test]
    async fn values_are_cached_until_invalidated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "ttwid=t; Path=/"))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/261378947940"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(2)
            .mount(&server)
            .await;

        let id = identity(&server);
        let _ = id.resolve().await.unwrap();
        let _ = id.resolve().await.unwrap();
        id.invalidate();
        assert!(id.cached_room_id().is_none());
        let _ = id.resolve().await.unwrap();
    }

    #[tokio::test]
    async fn missing_token_degrades_to_empty() {
        let server = MockServer::start().await;
        mount_root(&server, None).await;
        Mock::given(method("GET"))
            .and(path("/261378947940"))
            .and(header_regex("cookie", r"^ttwid=&msToken="))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let id = identity(&server);
        assert_matches!(id.token().await, Err(IdentityError::TokenMissing));
        let resolved = id.resolve().await.unwrap();
        assert_eq!(resolved.token, "");
        assert_eq!(resolved.room_id, "7392091211001140287");
    }

    #[tokio::test]
    async fn missing_room_id_is_an_error() {
        let server = MockServer::start().await;
        mount_root(&server, Some("ttwid=t; Path=/")).await;
        Mock::given(method("GET"))
            .and(path("/261378947940"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>offline</html>"))
            .mount(&server)
            .await;

        let err = identity(&server).resolve().await.unwrap_err();
        assert_matches!(err, IdentityError::RoomIdNotFound { live_id } if live_id == "261378947940");
    }

    #[tokio::test]
    async fn failed_token_request_degrades_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/261378947940"))
            .and(header_regex("cookie", r"^ttwid=&msToken="))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let notices = Arc::new(StdMutex::new(Vec::new()));
        let seen = notices.clone();
        let id = identity(&server).with_notifier(Arc::new(move |n: Notice| seen.lock().unwrap().push(n)));
        assert_matches!(id.token().await, Err(IdentityError::Http { .. }));

        let resolved = id.resolve().await.unwrap();
        assert_eq!(resolved.token, "");
        assert_eq!(resolved.room_id, "7392091211001140287");
        let notices = notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].is_error());
        assert!(notices[0].message.contains("anti-bot token unavailable"));
    }

    #[tokio::test]
    async fn missing_cookie_fetches_root_once_per_resolve() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/261378947940"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let resolved = identity(&server).resolve().await.unwrap();
        assert_eq!(resolved.token, "");
    }

    #[tokio::test]
    async fn failed_room_page_is_reported() {
        let server = MockServer::start().await;
        mount_root(&server, Some("ttwid=t; Path=/")).await;
        Mock::given(method("GET"))
            .and(path("/261378947940"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = identity(&server).resolve().await.unwrap_err();
        assert_matches!(err, IdentityError::Http { url, .. } if url.ends_with("/261378947940"));
    }
}
