//! Keepalive pings.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt};
use livetap_wire::encode_heartbeat;
use tokio::sync::Mutex;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why the keepalive loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepaliveResult {
    /// The session ended.
    Cancelled,
    /// A ping could not be written.
    SendFailed(String),
}

/// Send a heartbeat ping every `interval` until cancelled.
///
/// The first ping goes out immediately. Each ping carries an encoded
/// `hb` push frame as its payload.
pub async fn run_keepalive<W>(
    writer: Arc<Mutex<W>>,
    interval: Duration,
    cancel: CancellationToken,
) -> KeepaliveResult
where
    W: Sink<Message> + Unpin + Send,
    W::Error: Display,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return KeepaliveResult::Cancelled,
            _ = ticker.tick() => {
                let ping = Message::Ping(encode_heartbeat().into());
                let mut writer = writer.lock().await;
                if let Err(e) = writer.send(ping).await {
                    debug!(error = %e, "keepalive ping failed");
                    return KeepaliveResult::SendFailed(e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::channel::mpsc;

    #[tokio::test(start_paused = true)]
    async fn pings_on_every_tick() {
        let (tx, mut rx) = mpsc::unbounded::<Message>();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_keepalive(
            Arc::new(Mutex::new(tx)),
            Duration::from_secs(5),
            cancel.clone(),
        ));

        // Immediate ping, then one per interval.
        for _ in 0..3 {
            let msg = rx.next().await.unwrap();
            assert!(matches!(msg, Message::Ping(ref p) if p.as_ref() == encode_heartbeat().as_slice()));
        }

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), KeepaliveResult::Cancelled);
    }

    #[tokio::test]
    async fn stops_when_socket_is_gone() {
        let (tx, rx) = mpsc::unbounded::<Message>();
        drop(rx);
        let result = run_keepalive(
            Arc::new(Mutex::new(tx)),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, KeepaliveResult::SendFailed(_)));
    }

    #[tokio::test]
    async fn cancelled_before_first_tick() {
        let (tx, _rx) = mpsc::unbounded::<Message>();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_keepalive(Arc::new(Mutex::new(tx)), Duration::from_secs(100), cancel).await;
        assert_eq!(result, KeepaliveResult::Cancelled);
    }
}
