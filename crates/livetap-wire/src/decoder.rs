//! Message classification.
//!
//! Maps a room message's declared method to a typed [`EventPayload`]. Only
//! chat and member (room-entry) bodies are decoded; every other method is
//! returned as [`EventPayload::Unclassified`] without touching its payload.

use livetap_core::{ChatEvent, DecodeError, EventPayload, Gender, RoomEntryEvent};
use prost::Message as _;

use crate::proto::{ChatMessage, Common, MemberMessage, Message, User};

/// Method name of chat messages.
pub const CHAT_METHOD: &str = "WebcastChatMessage";
/// Method name of room-entry messages.
pub const MEMBER_METHOD: &str = "WebcastMemberMessage";

/// Decode one message of a batch.
pub fn classify(message: &Message) -> Result<EventPayload, DecodeError> {
    match message.method.as_str() {
        CHAT_METHOD => {
            let chat = ChatMessage::decode(message.payload.as_slice())
                .map_err(|e| DecodeError::protobuf("ChatMessage", e))?;
            let user = chat.user.unwrap_or_default();
            Ok(EventPayload::Chat(ChatEvent {
                user_id: user.id,
                user_name: user.nick_name,
                content: chat.content,
                origin_ms: origin_ms(chat.common.as_ref()),
            }))
        }
        MEMBER_METHOD => {
            let member = MemberMessage::decode(message.payload.as_slice())
                .map_err(|e| DecodeError::protobuf("MemberMessage", e))?;
            let User {
                id,
                nick_name,
                gender,
                ..
            } = member.user.unwrap_or_default();
            Ok(EventPayload::RoomEntry(RoomEntryEvent {
                viewer_id: id,
                viewer_name: nick_name,
                viewer_gender: Gender::from_flag(gender),
                origin_ms: origin_ms(member.common.as_ref()),
            }))
        }
        other => Ok(EventPayload::Unclassified {
            method: other.to_string(),
        }),
    }
}

fn origin_ms(common: Option<&Common>) -> u64 {
    common.map_or(0, |c| c.create_time)
}
