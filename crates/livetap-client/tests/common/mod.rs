//! Local stand-ins for the site, the signer and the push socket.

#![allow(dead_code, missing_docs)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use livetap_client::{ClientConfig, Signer};
use livetap_core::{Notice, SignatureError, epoch_millis};
use livetap_wire::encode_data_frame;
use livetap_wire::proto::{ChatMessage, Common, Message as WireMessage, Response, User};
use prost::Message as _;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LIVE_ID: &str = "261378947940";
pub const ROOM_ID: &str = "7392091211001140287";

/// Site root serving the anti-bot cookie and the room page.
pub async fn site() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "ttwid=1%7Cabc; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{LIVE_ID}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!(r#"{{\"roomId\":\"{ROOM_ID}\"}}"#)),
        )
        .mount(&server)
        .await;
    server
}

/// Signer that counts its invocations.
#[derive(Default)]
pub struct CountingSigner {
    calls: AtomicUsize,
}

impl CountingSigner {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for CountingSigner {
    async fn sign(&self, _digest: &str) -> Result<String, SignatureError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("test-signature".into())
    }
}

/// Collected notices.
#[derive(Clone, Default)]
pub struct Notices(Arc<StdMutex<Vec<Notice>>>);

impl Notices {
    pub fn push(&self, notice: Notice) {
        self.0.lock().unwrap().push(notice);
    }

    pub fn containing(&self, needle: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.message.contains(needle))
            .count()
    }
}

/// Fake push endpoint handing each accepted socket to the test.
pub struct PushServer {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<ServerConn>,
}

impl PushServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, connections) = mpsc::unbounded_channel();
        drop(tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = accept_async(stream).await else {
                    continue;
                };
                if tx.send(ServerConn { ws }).is_err() {
                    break;
                }
            }
        }));
        Self { addr, connections }
    }

    pub fn endpoint(&self) -> String {
        format!("ws://{}/webcast/im/push/v2/", self.addr)
    }

    pub async fn next_connection(&mut self, within: Duration) -> Option<ServerConn> {
        tokio::time::timeout(within, self.connections.recv()).await.ok().flatten()
    }
}

/// Server side of one push socket.
pub struct ServerConn {
    ws: WebSocketStream<TcpStream>,
}

impl ServerConn {
    pub async fn send(&mut self, frame: Vec<u8>) {
        self.ws.send(Message::Binary(frame.into())).await.unwrap();
    }

    /// Next binary frame from the client, skipping keepalive pings.
    pub async fn recv_binary(&mut self, within: Duration) -> Option<Vec<u8>> {
        tokio::time::timeout(within, async {
            while let Some(Ok(msg)) = self.ws.next().await {
                if let Message::Binary(bytes) = msg {
                    return Some(bytes.to_vec());
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    /// Wait until the client closes the socket.
    pub async fn closed(&mut self, within: Duration) -> bool {
        tokio::time::timeout(within, async {
            while let Some(Ok(msg)) = self.ws.next().await {
                if msg.is_close() {
                    return;
                }
            }
        })
        .await
        .is_ok()
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

pub fn chat(user_id: u64, content: &str, create_time: u64) -> WireMessage {
    WireMessage {
        method: "WebcastChatMessage".into(),
        payload: ChatMessage {
            common: Some(Common {
                create_time,
                ..Common::default()
            }),
            user: Some(User {
                id: user_id,
                nick_name: format!("user{user_id}"),
                ..User::default()
            }),
            content: content.into(),
            ..ChatMessage::default()
        }
        .encode_to_vec(),
        ..WireMessage::default()
    }
}

/// Gzipped data frame carrying `messages`, dated now.
pub fn data_frame(log_id: u64, messages: Vec<WireMessage>, need_ack: bool) -> Vec<u8> {
    let response = Response {
        messages_list: messages,
        internal_ext: format!("internal_src:dim|fetch_time:{}", epoch_millis()),
        need_ack,
        ..Response::default()
    };
    encode_data_frame(log_id, &response, true)
}

/// Config pointed at the local site and push server, with short timings.
pub fn config(site: &MockServer, endpoint: String) -> ClientConfig {
    let mut config = ClientConfig::new(LIVE_ID);
    config.root_url = format!("{}/", site.uri());
    config.push.endpoint = endpoint;
    config.credential = Some("backend-token".into());
    config.heartbeat_interval = Duration::from_secs(5);
    config.watchdog_tick = Duration::from_millis(20);
    config.silence_threshold = Duration::ZERO;
    config.retry_delay = Duration::from_millis(50);
    config
}
