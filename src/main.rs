//! # livetap
//!
//! Command-line entry point: loads settings, starts the room client and the
//! HTTP API, and runs until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use livetap_client::{ClientConfig, HttpRelay, LiveClient};
use livetap_core::{Notifier, TracingNotifier};
use livetap_server::{ApiServer, ShutdownCoordinator};
use livetap_settings::{LivetapSettings, LogFormat};
use tracing::{error, info, warn};

/// Live-room push ingestion client.
#[derive(Parser, Debug)]
#[command(name = "livetap", about = "Stream chat and room-entry events from a live room")]
struct Cli {
    /// Room handle (the number in the room URL).
    #[arg(long)]
    live_id: Option<String>,

    /// Minimum seconds between emitted chat events (0 disables).
    #[arg(long)]
    chat_interval: Option<u64>,

    /// Minimum seconds between emitted room-entry events (0 disables).
    #[arg(long)]
    room_entry_interval: Option<u64>,

    /// Seconds without room traffic before reconnecting (0 disables).
    #[arg(long)]
    silence_threshold: Option<u64>,

    /// Settings file (defaults to `~/.livetap/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Do not start the HTTP API.
    #[arg(long)]
    no_api: bool,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn load_settings(&self) -> Result<LivetapSettings> {
        let mut settings = match &self.settings {
            Some(path) => livetap_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => livetap_settings::load_settings().context("Failed to load settings")?,
        };

        if let Some(live_id) = &self.live_id {
            settings.room.live_id.clone_from(live_id);
        }
        if let Some(secs) = self.chat_interval {
            settings.gate.chat_interval_ms = secs.saturating_mul(1_000);
        }
        if let Some(secs) = self.room_entry_interval {
            settings.gate.room_entry_interval_ms = secs.saturating_mul(1_000);
        }
        if let Some(secs) = self.silence_threshold {
            settings.timing.silence_threshold_ms = secs.saturating_mul(1_000);
        }
        if self.no_api {
            settings.api.enabled = false;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }

        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

fn build_client(settings: &LivetapSettings) -> Result<LiveClient> {
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let mut builder = LiveClient::builder(ClientConfig::from_settings(settings))
        .notifier(Arc::clone(&notifier));

    let relay_http = reqwest::Client::builder()
        .timeout(Duration::from_millis(settings.relay.timeout_ms))
        .build()
        .context("Failed to build relay HTTP client")?;
    match HttpRelay::from_settings(&settings.relay, relay_http, notifier) {
        Some(relay) => {
            info!(url = %settings.relay.server_url, "relaying events to backend");
            builder = builder.sink(Arc::new(relay));
        }
        None => warn!("no relay token configured, events will only be served locally"),
    }

    Ok(builder.build())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    match settings.logging.format {
        LogFormat::Compact => livetap_core::logging::init_subscriber(&settings.logging.level),
        LogFormat::Json => livetap_core::logging::init_json_subscriber(&settings.logging.level),
    }
    info!(live_id = %settings.room.live_id, "livetap starting");

    let client = build_client(&settings)?;
    let shutdown = ShutdownCoordinator::new();
    let mut tasks = Vec::new();

    if settings.api.enabled {
        let metrics = match livetap_server::install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "metrics disabled");
                None
            }
        };
        let listener = ApiServer::bind(&settings.api).await?;
        let server = ApiServer::new(client.clone(), metrics);
        let token = shutdown.token();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, token).await {
                error!(error = %e, "api server failed");
            }
        }));
    }

    let Some(run) = client.start() else {
        shutdown.graceful_shutdown(&client, tasks, None).await;
        anyhow::bail!("client did not start: a backend token (relay.token) is required");
    };

    let outcome = tokio::select! {
        result = run => Some(result.context("client task panicked")?),
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("interrupt received, shutting down");
            None
        }
    };

    shutdown.graceful_shutdown(&client, tasks, None).await;

    match outcome {
        Some(Err(e)) => Err(e).context("live client stopped"),
        _ => Ok(()),
    }
}
