//! Event sinks.
//!
//! Every event that survives filtering goes to the [`Mailbox`] inline and to
//! each registered [`EventSink`] on its own task, so a slow or failing sink
//! never stalls the socket's receive loop.

use std::sync::Arc;

use async_trait::async_trait;
use livetap_core::{LiveEvent, Notice, Notifier, RelayError};
use tokio::sync::mpsc;
use tracing::warn;

use crate::mailbox::Mailbox;

/// Destination for emitted events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &str;

    /// Deliver one event.
    async fn deliver(&self, event: &LiveEvent) -> Result<(), RelayError>;
}

/// Forwards events into an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LiveEvent>,
}

impl ChannelSink {
    /// Sink plus the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LiveEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    async fn deliver(&self, event: &LiveEvent) -> Result<(), RelayError> {
        self.tx
            .send(event.clone())
            .map_err(|_| RelayError::Transport("receiver dropped".into()))
    }
}

/// Fan-out to the mailbox and all registered sinks.
#[derive(Clone)]
pub struct SinkSet {
    mailbox: Arc<Mailbox>,
    sinks: Vec<Arc<dyn EventSink>>,
    notifier: Arc<dyn Notifier>,
}

impl SinkSet {
    /// Fan-out over `sinks`, with `mailbox` always updated first.
    pub fn new(
        mailbox: Arc<Mailbox>,
        sinks: Vec<Arc<dyn EventSink>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            mailbox,
            sinks,
            notifier,
        }
    }

    /// The latest-event mailbox.
    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    /// Number of registered sinks, excluding the mailbox.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether only the mailbox receives events.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver `event` everywhere. Sink failures are reported through the
    /// notifier and never propagate.
    pub fn deliver(&self, event: LiveEvent) {
        self.mailbox.put(event.clone());

        for sink in &self.sinks {
            let sink = Arc::clone(sink);
            let notifier = Arc::clone(&self.notifier);
            let event = event.clone();
            drop(tokio::spawn(async move {
                if let Err(err) = sink.deliver(&event).await {
                    warn!(sink = sink.name(), error = %err, "sink delivery failed");
                    notifier.notify(Notice::error(format!(
                        "{} delivery failed: {err}",
                        sink.name()
                    )));
                }
            }));
        }
    }
}
