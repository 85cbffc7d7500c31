//! Typed room events.
//!
//! [`EventPayload`] is what the decoder produces for every inbound message.
//! Only chat and room-entry payloads survive filtering; those become a
//! [`LiveEvent`], the unit handed to sinks and served by the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Throttling category of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Chat (danmaku) message.
    #[serde(rename = "chat")]
    Chat,
    /// A viewer entered the room.
    #[serde(rename = "enter_room")]
    RoomEntry,
}

impl EventCategory {
    /// Wire/API name of the category.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::RoomEntry => "enter_room",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Viewer gender flag as reported by the platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Flag value 0.
    Female,
    /// Flag value 1.
    Male,
    /// Any other value.
    #[default]
    Unknown,
}

impl Gender {
    /// Map the raw platform flag.
    pub const fn from_flag(flag: u32) -> Self {
        match flag {
            0 => Self::Female,
            1 => Self::Male,
            _ => Self::Unknown,
        }
    }
}

/// A chat message posted in the room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Author user id.
    pub user_id: u64,
    /// Author display name.
    pub user_name: String,
    /// Message text.
    pub content: String,
    /// Origin timestamp in epoch milliseconds (0 when unknown).
    #[serde(default)]
    pub origin_ms: u64,
}

/// A viewer entered the room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEntryEvent {
    /// Viewer user id.
    pub viewer_id: u64,
    /// Viewer display name.
    pub viewer_name: String,
    /// Viewer gender flag.
    pub viewer_gender: Gender,
    /// Origin timestamp in epoch milliseconds (0 when unknown).
    #[serde(default)]
    pub origin_ms: u64,
}

/// Decoded message, classified by its declared method name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPayload {
    /// `WebcastChatMessage`.
    Chat(ChatEvent),
    /// `WebcastMemberMessage`.
    RoomEntry(RoomEntryEvent),
    /// Any other method; dropped by the session.
    Unclassified {
        /// The declared method name.
        method: String,
    },
}

impl EventPayload {
    /// Throttling category, `None` for unclassified payloads.
    pub fn category(&self) -> Option<EventCategory> {
        match self {
            Self::Chat(_) => Some(EventCategory::Chat),
            Self::RoomEntry(_) => Some(EventCategory::RoomEntry),
            Self::Unclassified { .. } => None,
        }
    }

    /// Embedded origin timestamp (epoch ms), 0 when the message has none.
    pub fn origin_ms(&self) -> u64 {
        match self {
            Self::Chat(chat) => chat.origin_ms,
            Self::RoomEntry(entry) => entry.origin_ms,
            Self::Unclassified { .. } => 0,
        }
    }
}

/// Data carried by an emitted event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    /// Chat payload.
    Chat(ChatEvent),
    /// Room-entry payload.
    RoomEntry(RoomEntryEvent),
}

/// An event that passed filtering and is being delivered to sinks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEvent {
    /// Event category, serialized as `type`.
    #[serde(rename = "type")]
    pub category: EventCategory,
    /// When the client emitted the event.
    pub timestamp: DateTime<Utc>,
    /// Event data.
    pub data: EventData,
}

impl LiveEvent {
    /// Wrap a classified payload, stamping it with the current time.
    ///
    /// Returns `None` for unclassified payloads.
    pub fn from_payload(payload: EventPayload) -> Option<Self> {
        Self::at(payload, Utc::now())
    }

    /// Wrap a classified payload with an explicit emission time.
    pub fn at(payload: EventPayload, timestamp: DateTime<Utc>) -> Option<Self> {
        let (category, data) = match payload {
            EventPayload::Chat(chat) => (EventCategory::Chat, EventData::Chat(chat)),
            EventPayload::RoomEntry(entry) => {
                (EventCategory::RoomEntry, EventData::RoomEntry(entry))
            }
            EventPayload::Unclassified { .. } => return None,
        };
        Some(Self {
            category,
            timestamp,
            data,
        })
    }

    /// Id of the user who caused the event.
    pub fn actor_id(&self) -> u64 {
        match &self.data {
            EventData::Chat(chat) => chat.user_id,
            EventData::RoomEntry(entry) => entry.viewer_id,
        }
    }

    /// Short human-readable summary used in notices.
    pub fn summary(&self) -> String {
        match &self.data {
            EventData::Chat(chat) => {
                format!("[{}]{}: {}", chat.user_id, chat.user_name, chat.content)
            }
            EventData::RoomEntry(entry) => format!(
                "[{}][{:?}]{} entered the room",
                entry.viewer_id, entry.viewer_gender, entry.viewer_name
            ),
        }
    }
}
