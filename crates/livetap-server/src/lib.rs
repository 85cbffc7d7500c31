//! # livetap-server
//!
//! HTTP API over a running [`LiveClient`](livetap_client::LiveClient):
//! `GET /api/messages` drains the latest event, `GET /health` reports the
//! session phase, `GET /metrics` renders Prometheus text.

#![deny(unsafe_code)]

pub mod errors;
pub mod health;
pub mod prometheus;
pub mod server;
pub mod shutdown;

pub use errors::ServerError;
pub use prometheus::install_recorder;
pub use server::{ApiServer, AppState};
pub use shutdown::ShutdownCoordinator;
