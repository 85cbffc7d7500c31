//! `ApiServer`: Axum HTTP API over a running client.

use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use livetap_client::LiveClient;
use livetap_core::LiveEvent;
use livetap_settings::ApiSettings;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::prometheus;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The client being served.
    pub client: LiveClient,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// Body of `GET /api/messages`.
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// At most one event: the latest since the previous call.
    pub messages: Vec<LiveEvent>,
}

/// HTTP API server.
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    /// Server over `client`, rendering `metrics` at `/metrics` when given.
    pub fn new(client: LiveClient, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            state: AppState {
                client,
                metrics,
                start_time: Instant::now(),
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/messages", get(messages_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
    }

    /// Bind the configured address.
    pub async fn bind(settings: &ApiSettings) -> Result<TcpListener, ServerError> {
        let addr = format!("{}:{}", settings.host, settings.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serve on `listener` until `shutdown` is cancelled.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "api server started");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;
        info!("api server stopped");
        Ok(())
    }
}

/// GET /api/messages
async fn messages_handler(State(state): State<AppState>) -> Json<MessagesResponse> {
    Json(MessagesResponse {
        status: "success",
        messages: state.client.latest_event().into_iter().collect(),
    })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let client = &state.client;
    Json(health::health_check(
        state.start_time,
        client.live_id(),
        client.is_running(),
        client.phase(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => prometheus::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
