//! # livetap-core
//!
//! Shared vocabulary for the livetap crates:
//!
//! - **Events**: [`EventPayload`] over chat, room-entry and unclassified
//!   messages, and the emitted [`LiveEvent`] handed to sinks
//! - **Errors**: one `thiserror` enum per failure domain (signing, identity,
//!   socket, decode, relay) plus the session-level [`SessionError`]
//! - **Notices**: the human-readable status callback ([`Notifier`])
//! - **Logging**: `tracing` subscriber setup and a capture layer for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod logging;
pub mod notice;

pub use errors::{
    DecodeError, IdentityError, RelayError, SessionError, SignatureError, SocketError,
};
pub use events::{
    ChatEvent, EventCategory, EventData, EventPayload, Gender, LiveEvent, RoomEntryEvent,
};
pub use notice::{Notice, NoticeLevel, Notifier, TracingNotifier};

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
