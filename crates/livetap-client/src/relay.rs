//! HTTP relay of emitted events to a downstream backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use livetap_core::{LiveEvent, Notice, Notifier, RelayError};
use livetap_settings::RelaySettings;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::{debug, warn};

use crate::sink::EventSink;
use crate::telemetry::RELAY_FAILURES_TOTAL;

/// Path appended to the backend base URL.
pub const PUSH_PATH: &str = "/live-messages/push";

/// JSON body posted for each event.
#[derive(Debug, Serialize)]
pub struct RelayRecord<'a> {
    /// `{actor_id}_{unix_seconds}`.
    pub id: String,
    /// The event: `type`, `timestamp` and `data`.
    #[serde(flatten)]
    pub event: &'a LiveEvent,
    /// Backend account the record belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
}

impl<'a> RelayRecord<'a> {
    /// Record for `event` on behalf of `username`.
    pub fn new(event: &'a LiveEvent, username: Option<&'a str>) -> Self {
        Self {
            id: format!("{}_{}", event.actor_id(), event.timestamp.timestamp()),
            event,
            username,
        }
    }
}

/// Posts every event to `{server_url}/live-messages/push` with bounded retry.
pub struct HttpRelay {
    http: reqwest::Client,
    url: String,
    token: String,
    username: Option<String>,
    max_attempts: u32,
    retry_delay: Duration,
    notifier: Arc<dyn Notifier>,
}

impl HttpRelay {
    /// Relay configured from settings; `None` without a backend token.
    pub fn from_settings(
        settings: &RelaySettings,
        http: reqwest::Client,
        notifier: Arc<dyn Notifier>,
    ) -> Option<Self> {
        let token = settings.token.clone()?;
        Some(Self {
            http,
            url: format!("{}{PUSH_PATH}", settings.server_url.trim_end_matches('/')),
            token,
            username: settings.username.clone(),
            max_attempts: settings.max_attempts.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            notifier,
        })
    }

    async fn post_once(&self, record: &RelayRecord<'_>) -> Result<(), RelayError> {
        let response = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, &self.token)
            .json(record)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RelayError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl EventSink for HttpRelay {
    fn name(&self) -> &str {
        "relay"
    }

    async fn deliver(&self, event: &LiveEvent) -> Result<(), RelayError> {
        let record = RelayRecord::new(event, self.username.as_deref());
        let mut last = String::new();

        for attempt in 1..=self.max_attempts {
            match self.post_once(&record).await {
                Ok(()) => {
                    debug!(attempt, id = %record.id, "event relayed");
                    self.notifier
                        .notify(Notice::success(format!("pushed: {}", event.summary())));
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, max = self.max_attempts, error = %err, "relay attempt failed");
                    metrics::counter!(RELAY_FAILURES_TOTAL).increment(1);
                    self.notifier.notify(Notice::error(format!("push failed: {err}")));
                    last = err.to_string();
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(RelayError::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use livetap_core::{ChatEvent, EventPayload};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event() -> LiveEvent {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        LiveEvent::at(
            EventPayload::Chat(ChatEvent {
                user_id: 42,
                user_name: "alice".into(),
                content: "hello".into(),
                origin_ms: 0,
            }),
            ts,
        )
        .unwrap()
    }

    fn relay(server: &MockServer, notices: Arc<Mutex<Vec<Notice>>>) -> HttpRelay {
        let settings = RelaySettings {
            server_url: format!("{}/", server.uri()),
            token: Some("secret".into()),
            username: Some("operator".into()),
            retry_delay_ms: 1,
            ..RelaySettings::default()
        };
        HttpRelay::from_settings(
            &settings,
            reqwest::Client::new(),
            Arc::new(move |n: Notice| notices.lock().unwrap().push(n)),
        )
        .unwrap()
    }

    #[test]
    fn record_shape() {
        let event = event();
        let json = serde_json::to_value(RelayRecord::new(&event, Some("operator"))).unwrap();
        assert_eq!(json["id"], format!("42_{}", event.timestamp.timestamp()));
        assert_eq!(json["type"], "chat");
        assert_eq!(json["username"], "operator");
        assert_eq!(json["data"]["content"], "hello");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn no_token_means_no_relay() {
        let relay = HttpRelay::from_settings(
            &RelaySettings::default(),
            reqwest::Client::new(),
            Arc::new(|_n: Notice| {}),
        );
        assert!(relay.is_none());
    }

    #[tokio::test]
    async fn posts_with_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/live-messages/push"))
            .and(header("authorization", "secret"))
            .and(body_partial_json(serde_json::json!({"type": "chat", "username": "operator"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notices = Arc::new(Mutex::new(Vec::new()));
        relay(&server, notices.clone()).deliver(&event()).await.unwrap();
        assert!(notices.lock().unwrap()[0].message.starts_with("pushed: [42]alice"));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notices = Arc::new(Mutex::new(Vec::new()));
        relay(&server, notices.clone()).deliver(&event()).await.unwrap();
        let notices = notices.lock().unwrap();
        assert_eq!(notices.iter().filter(|n| n.is_error()).count(), 2);
        assert!(!notices.last().unwrap().is_error());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = relay(&server, Arc::new(Mutex::new(Vec::new())))
            .deliver(&event())
            .await
            .unwrap_err();
        assert_matches!(err, RelayError::Exhausted { attempts: 3, last } if last.contains("500"));
    }
}
