//! One push connection: handshake, inbound dispatch, keepalive.
//!
//! A session is single-use. [`SessionContext::connect`] performs the
//! handshake and [`SessionContext::run`] drives the open socket until the
//! server closes it, the read side fails, or the close token is cancelled
//! (by `stop` or by the silence watchdog). Reconnecting is the client's job.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use livetap_core::{LiveEvent, Notice, Notifier, SessionError, SocketError, epoch_millis};
use livetap_wire::{FrameKind, classify, decode_envelope};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{COOKIE, USER_AGENT};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::activity::ActivityClock;
use crate::config::ClientConfig;
use crate::filter::StalenessFilter;
use crate::gate::{RateGate, RateLimits};
use crate::heartbeat::run_keepalive;
use crate::identity::{ResolvedIdentity, RoomIdentity};
use crate::params::ConnectionParameters;
use crate::signature::SignatureProvider;
use crate::sink::SinkSet;
use crate::telemetry::{
    ACKS_SENT_TOTAL, EVENTS_DROPPED_TOTAL, EVENTS_EMITTED_TOTAL, FRAME_DECODE_ERRORS_TOTAL,
    FRAMES_RECEIVED_TOTAL,
};

/// Socket type produced by the handshake.
pub type PushSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handshake deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Lifecycle of the current connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Not started, or between attempts.
    #[default]
    Idle,
    /// Resolving identity, signing and handshaking.
    Connecting,
    /// Socket open and dispatching.
    Open,
    /// Tearing the socket down.
    Closing,
    /// Socket gone.
    Closed,
}

impl SessionPhase {
    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an open session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The server closed the socket or the stream ended.
    RemoteClosed,
    /// The close token was cancelled (stop or watchdog).
    ForceClosed,
    /// Reading or acknowledging failed.
    SocketFailed(SocketError),
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoteClosed => f.write_str("closed by server"),
            Self::ForceClosed => f.write_str("closed locally"),
            Self::SocketFailed(err) => write!(f, "{err}"),
        }
    }
}

/// Shared collaborators of every session a client opens.
pub struct SessionContext {
    /// Client configuration.
    pub config: Arc<ClientConfig>,
    /// Room identity cache.
    pub identity: Arc<RoomIdentity>,
    /// Handshake signer.
    pub signer: SignatureProvider,
    /// Last inbound traffic, read by the watchdog.
    pub clock: Arc<ActivityClock>,
    /// Per-category emission intervals.
    pub limits: Arc<RateLimits>,
    /// Event destinations.
    pub sinks: SinkSet,
    /// Status notices.
    pub notifier: Arc<dyn Notifier>,
    /// Published session phase.
    pub phase: watch::Sender<SessionPhase>,
}

impl SessionContext {
    fn set_phase(&self, phase: SessionPhase) {
        let _ = self.phase.send_replace(phase);
    }

    /// Resolve identity, sign and open the push socket.
    pub async fn connect(&self) -> Result<PushSocket, SessionError> {
        self.set_phase(SessionPhase::Connecting);
        self.identity.invalidate();

        let ResolvedIdentity { token, room_id } = self.identity.resolve().await?;
        let endpoint = &self.config.push.endpoint;
        let params = ConnectionParameters::build(&self.config.push, &room_id, epoch_millis());
        let signature = self.signer.sign_url(&params.url(endpoint)).await?;
        let url = params.signed_url(endpoint, &signature);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SocketError::InvalidRequest(e.to_string()))?;
        let headers = request.headers_mut();
        let _ = headers.insert(COOKIE, header_value(&format!("ttwid={token}"))?);
        let _ = headers.insert(USER_AGENT, header_value(&self.config.user_agent)?);

        debug!(live_id = %self.config.live_id, %room_id, "opening push socket");
        let (socket, _response) = time::timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| SocketError::Connect(format!("handshake timed out after {CONNECT_TIMEOUT:?}")))?
            .map_err(|e| SocketError::Connect(e.to_string()))?;
        Ok(socket)
    }

    /// Drive an open socket until it closes or `close` is cancelled.
    pub async fn run(&self, socket: PushSocket, close: CancellationToken) -> SessionEnd {
        let established_at = epoch_millis();
        self.clock.touch();
        self.set_phase(SessionPhase::Open);
        info!(live_id = %self.config.live_id, established_at, "session open");

        let (writer, mut reader) = socket.split();
        let writer = Arc::new(Mutex::new(writer));
        let keepalive = close.child_token();
        drop(tokio::spawn(run_keepalive(
            Arc::clone(&writer),
            self.config.heartbeat_interval,
            keepalive.clone(),
        )));

        let mut handler = FrameHandler::new(
            StalenessFilter::new(established_at),
            RateGate::new(Arc::clone(&self.limits)),
            self.sinks.clone(),
            Arc::clone(&self.notifier),
        );

        let end = loop {
            let msg = tokio::select! {
                biased;
                () = close.cancelled() => break SessionEnd::ForceClosed,
                msg = reader.next() => msg,
            };
            match msg {
                Some(Ok(Message::Binary(bytes))) => {
                    self.clock.touch();
                    if let Err(err) = handler.on_frame(&bytes, &writer).await {
                        break SessionEnd::SocketFailed(err);
                    }
                }
                Some(Ok(Message::Text(text))) => {
                    self.clock.touch();
                    trace!(len = text.len(), "ignoring text frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "server closed the socket");
                    break SessionEnd::RemoteClosed;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break SessionEnd::SocketFailed(SocketError::Receive(e.to_string())),
                None => break SessionEnd::RemoteClosed,
            }
        };

        keepalive.cancel();
        self.set_phase(SessionPhase::Closing);
        let _ = writer.lock().await.close().await;
        self.set_phase(SessionPhase::Closed);
        info!(live_id = %self.config.live_id, reason = %end, "session closed");
        end
    }
}

fn header_value(value: &str) -> Result<HeaderValue, SocketError> {
    HeaderValue::from_str(value).map_err(|e| SocketError::InvalidRequest(e.to_string()))
}

/// Inbound dispatch for one session.
pub struct FrameHandler {
    filter: StalenessFilter,
    gate: RateGate,
    sinks: SinkSet,
    notifier: Arc<dyn Notifier>,
}

impl FrameHandler {
    /// Handler applying `filter` then `gate` before delivering to `sinks`.
    pub fn new(
        filter: StalenessFilter,
        gate: RateGate,
        sinks: SinkSet,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            filter,
            gate,
            sinks,
            notifier,
        }
    }

    /// Handle one binary frame. The ack, when requested, is written before
    /// any message in the frame is delivered. Returns the number of events
    /// emitted; only a failed ack write is an error.
    pub async fn on_frame<W>(&mut self, bytes: &[u8], writer: &Mutex<W>) -> Result<usize, SocketError>
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        metrics::counter!(FRAMES_RECEIVED_TOTAL).increment(1);
        let envelope = match decode_envelope(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, len = bytes.len(), "dropping undecodable frame");
                metrics::counter!(FRAME_DECODE_ERRORS_TOTAL).increment(1);
                self.notifier.notify(Notice::error(format!("bad frame: {err}")));
                return Ok(0);
            }
        };

        if let Some(ack) = envelope.ack() {
            writer
                .lock()
                .await
                .send(Message::Binary(ack.into()))
                .await
                .map_err(|e| SocketError::Send(e.to_string()))?;
            metrics::counter!(ACKS_SENT_TOTAL).increment(1);
            trace!(log_id = envelope.log_id, "ack sent");
        }

        if envelope.kind != FrameKind::Data {
            trace!(kind = ?envelope.kind, "non-data frame");
            return Ok(0);
        }

        let mut emitted = 0;
        for message in &envelope.response.messages_list {
            let payload = match classify(message) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(method = %message.method, error = %err, "skipping undecodable message");
                    metrics::counter!(FRAME_DECODE_ERRORS_TOTAL).increment(1);
                    self.notifier
                        .notify(Notice::error(format!("bad {} message: {err}", message.method)));
                    continue;
                }
            };
            let Some(category) = payload.category() else {
                continue;
            };
            if !self.filter.emits(payload.origin_ms()) {
                metrics::counter!(EVENTS_DROPPED_TOTAL, "reason" => "stale").increment(1);
                continue;
            }
            if !self.gate.allow(category, Instant::now()) {
                metrics::counter!(EVENTS_DROPPED_TOTAL, "reason" => "throttled").increment(1);
                continue;
            }
            let Some(event) = LiveEvent::from_payload(payload) else {
                continue;
            };

            self.notifier.notify(Notice::info(event.summary()));
            self.sinks.deliver(event);
            metrics::counter!(EVENTS_EMITTED_TOTAL, "category" => category.as_str()).increment(1);
            emitted += 1;
        }
        Ok(emitted)
    }
}
