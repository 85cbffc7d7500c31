//! # livetap-client
//!
//! Connects to a live room's push socket and turns its traffic into
//! [`LiveEvent`](livetap_core::LiveEvent)s:
//!
//! - **Handshake**: [`identity`] resolves the anti-bot token and room id,
//!   [`params`] builds the endpoint query, [`signature`] signs it
//! - **Session**: [`session`] opens the socket, acks frames and dispatches
//!   messages through [`filter`] and [`gate`] to the [`sink`]s
//! - **Supervision**: [`heartbeat`] keeps the socket alive, [`supervisor`]
//!   restarts it after prolonged silence, [`retry`] bounds reconnects
//! - **Façade**: [`LiveClient`] ties it together behind start/stop

#![deny(unsafe_code)]

pub mod activity;
pub mod client;
pub mod config;
pub mod filter;
pub mod gate;
pub mod heartbeat;
pub mod identity;
pub mod mailbox;
pub mod params;
pub mod relay;
pub mod retry;
pub mod room_status;
pub mod session;
pub mod signature;
pub mod sink;
pub mod supervisor;
pub mod telemetry;

pub use client::{LiveClient, LiveClientBuilder, RunHandle};
pub use config::ClientConfig;
pub use mailbox::Mailbox;
pub use relay::HttpRelay;
pub use room_status::{RoomStatus, fetch_room_status};
pub use session::{SessionEnd, SessionPhase};
pub use signature::{ScriptSigner, SignatureProvider, Signer};
pub use sink::{ChannelSink, EventSink};
