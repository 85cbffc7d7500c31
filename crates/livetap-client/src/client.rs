//! The client façade: start/stop, tunables, and the reconnect loop.

use std::sync::Arc;
use std::time::Duration;

use livetap_core::{EventCategory, LiveEvent, Notice, Notifier, SessionError, TracingNotifier};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::activity::ActivityClock;
use crate::config::ClientConfig;
use crate::gate::RateLimits;
use crate::identity::RoomIdentity;
use crate::mailbox::Mailbox;
use crate::retry::{RetryDecision, RetryState};
use crate::room_status::report_room_status;
use crate::session::{SessionContext, SessionPhase};
use crate::signature::{ScriptSigner, SignatureProvider, Signer};
use crate::sink::{EventSink, SinkSet};
use crate::supervisor::{SessionSlot, SessionSupervisor};
use crate::telemetry::{CONNECT_FAILURES_TOTAL, CONNECTIONS_TOTAL, RECONNECTS_TOTAL};

/// Outcome of a client run.
pub type RunHandle = JoinHandle<Result<(), SessionError>>;

/// Builder for [`LiveClient`].
pub struct LiveClientBuilder {
    config: ClientConfig,
    http: Option<reqwest::Client>,
    signer: Option<Arc<dyn Signer>>,
    sinks: Vec<Arc<dyn EventSink>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl LiveClientBuilder {
    /// HTTP client for identity and room-status requests.
    #[must_use]
    pub fn http(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Handshake signer; defaults to the configured signing script.
    #[must_use]
    pub fn signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Add an event sink.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Status notice callback; defaults to logging through `tracing`.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the client. Nothing runs until [`LiveClient::start`].
    pub fn build(self) -> LiveClient {
        let config = Arc::new(self.config.normalized());
        let http = self.http.unwrap_or_default();
        let signer = self
            .signer
            .unwrap_or_else(|| Arc::new(ScriptSigner::from_settings(&config.signer)));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let mailbox = Arc::new(Mailbox::new());
        let (phase, _) = watch::channel(SessionPhase::Idle);

        let session = Arc::new(SessionContext {
            identity: Arc::new(RoomIdentity::new(
                config.live_id.clone(),
                config.root_url.clone(),
                config.user_agent.clone(),
                http,
            )
            .with_notifier(Arc::clone(&notifier))),
            signer: SignatureProvider::new(signer),
            clock: Arc::new(ActivityClock::new()),
            limits: Arc::new(RateLimits::new(config.chat_interval, config.room_entry_interval)),
            sinks: SinkSet::new(Arc::clone(&mailbox), self.sinks, Arc::clone(&notifier)),
            notifier: Arc::clone(&notifier),
            phase,
            config,
        });

        LiveClient {
            inner: Arc::new(Inner {
                session,
                mailbox,
                slot: Arc::new(SessionSlot::new()),
                running: Mutex::new(None),
            }),
        }
    }
}

struct Inner {
    session: Arc<SessionContext>,
    mailbox: Arc<Mailbox>,
    slot: Arc<SessionSlot>,
    running: Mutex<Option<CancellationToken>>,
}

/// Live-room ingestion client.
///
/// Cheap to clone; clones share one connection. Several clients, for
/// different rooms, can run side by side.
#[derive(Clone)]
pub struct LiveClient {
    inner: Arc<Inner>,
}

impl LiveClient {
    /// Builder over `config`.
    pub fn builder(config: ClientConfig) -> LiveClientBuilder {
        LiveClientBuilder {
            config,
            http: None,
            signer: None,
            sinks: Vec::new(),
            notifier: None,
        }
    }

    fn ctx(&self) -> &SessionContext {
        &self.inner.session
    }

    fn notify(&self, notice: Notice) {
        self.ctx().notifier.notify(notice);
    }

    /// Room handle this client follows.
    pub fn live_id(&self) -> &str {
        &self.ctx().config.live_id
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.inner
            .running
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Start ingesting.
    ///
    /// Returns `None` without starting when no backend credential is
    /// configured or a run is already in progress.
    pub fn start(&self) -> Option<RunHandle> {
        if self.ctx().config.credential.is_none() {
            warn!(live_id = self.live_id(), "no backend credential configured, not starting");
            self.notify(Notice::error("no backend credential configured, not starting"));
            return None;
        }

        let running = {
            let mut guard = self.inner.running.lock();
            if guard.as_ref().is_some_and(|t| !t.is_cancelled()) {
                drop(guard);
                self.notify(Notice::info("already running"));
                return None;
            }
            let token = CancellationToken::new();
            *guard = Some(token.clone());
            token
        };

        let ctx = Arc::clone(&self.inner.session);
        info!(live_id = self.live_id(), "starting live client");
        self.notify(Notice::info(format!("starting room {}", self.live_id())));
        drop(tokio::spawn(report_room_status(
            Arc::clone(&ctx.identity),
            Arc::clone(&ctx.notifier),
        )));

        let threshold = ctx.config.silence_threshold;
        if !threshold.is_zero() {
            let supervisor = SessionSupervisor::new(
                Arc::clone(&ctx.clock),
                Arc::clone(&self.inner.slot),
                threshold,
                ctx.config.watchdog_tick,
                Arc::clone(&ctx.notifier),
            );
            drop(tokio::spawn(supervisor.run(running.clone())));
        }

        Some(tokio::spawn(run_sessions(ctx, Arc::clone(&self.inner.slot), running)))
    }

    /// Stop ingesting and close the socket. Returns whether a run was
    /// stopped; stopping a stopped client is a no-op.
    pub fn stop(&self) -> bool {
        let Some(token) = self.inner.running.lock().take() else {
            return false;
        };
        if token.is_cancelled() {
            return false;
        }
        token.cancel();
        let _ = self.inner.slot.force_close();
        info!(live_id = self.live_id(), "stopping live client");
        self.notify(Notice::info("stopped"));
        true
    }

    /// Take the most recent event, if any arrived since the last call.
    pub fn latest_event(&self) -> Option<LiveEvent> {
        self.inner.mailbox.take()
    }

    /// The latest-event mailbox.
    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.inner.mailbox
    }

    /// Minimum interval between emitted chat events (zero disables).
    pub fn set_chat_interval(&self, interval: Duration) {
        self.ctx().limits.set_interval(EventCategory::Chat, interval);
    }

    /// Minimum interval between emitted room-entry events (zero disables).
    pub fn set_room_entry_interval(&self, interval: Duration) {
        self.ctx()
            .limits
            .set_interval(EventCategory::RoomEntry, interval);
    }

    /// Current interval for `category`.
    pub fn interval(&self, category: EventCategory) -> Duration {
        self.ctx().limits.interval(category)
    }

    /// Current session phase.
    pub fn phase(&self) -> SessionPhase {
        *self.ctx().phase.borrow()
    }

    /// Receiver following the session phase.
    pub fn phase_watch(&self) -> watch::Receiver<SessionPhase> {
        self.ctx().phase.subscribe()
    }
}

/// Connect, run, reconnect until cancelled or out of retries.
async fn run_sessions(
    ctx: Arc<SessionContext>,
    slot: Arc<SessionSlot>,
    running: CancellationToken,
) -> Result<(), SessionError> {
    let config = Arc::clone(&ctx.config);
    let mut retry = RetryState::new(config.max_retries);

    loop {
        let attempt = tokio::select! {
            biased;
            () = running.cancelled() => break,
            attempt = ctx.connect() => attempt,
        };

        match attempt {
            Ok(socket) => {
                retry.reset();
                metrics::counter!(CONNECTIONS_TOTAL).increment(1);
                ctx.notifier.notify(Notice::success("connected"));

                let close = running.child_token();
                let ticket = slot.set(close.clone());
                let end = ctx.run(socket, close).await;
                let _ = slot.clear(ticket);

                drop(tokio::spawn(report_room_status(
                    Arc::clone(&ctx.identity),
                    Arc::clone(&ctx.notifier),
                )));
                if running.is_cancelled() {
                    break;
                }
                ctx.notifier.notify(Notice::info(format!("disconnected: {end}")));
                metrics::counter!(RECONNECTS_TOTAL).increment(1);
            }
            Err(err) => {
                let _ = ctx.phase.send_replace(SessionPhase::Idle);
                metrics::counter!(CONNECT_FAILURES_TOTAL, "category" => err.category()).increment(1);
                match retry.record_failure() {
                    RetryDecision::Retry { attempt } => {
                        warn!(attempt, max = retry.max(), error = %err, "connection attempt failed");
                        ctx.notifier.notify(Notice::error(format!(
                            "connect failed (attempt {attempt}/{}): {err}",
                            retry.max()
                        )));
                    }
                    RetryDecision::GiveUp { attempts } => {
                        error!(attempts, error = %err, "giving up on connection");
                        ctx.notifier.notify(Notice::error(format!(
                            "giving up after {attempts} failed attempts: {err}"
                        )));
                        running.cancel();
                        return Err(SessionError::RetriesExhausted { attempts });
                    }
                }
            }
        }

        tokio::select! {
            biased;
            () = running.cancelled() => break,
            () = tokio::time::sleep(config.retry_delay) => {}
        }
    }

    let _ = ctx.phase.send_replace(SessionPhase::Idle);
    Ok(())
}
