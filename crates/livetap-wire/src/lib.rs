//! # livetap-wire
//!
//! The push protocol spoken over the room socket:
//!
//! - [`proto`]: prost definitions of the frames and message bodies
//! - [`codec`]: envelope decoding (with gzip), ack and heartbeat encoding
//! - [`decoder`]: method-name classification into [`livetap_core::EventPayload`]

#![deny(unsafe_code)]

pub mod codec;
pub mod decoder;
pub mod proto;

pub use codec::{
    Envelope, FrameKind, decode_envelope, encode_ack, encode_data_frame, encode_heartbeat, gunzip,
};
pub use decoder::{CHAT_METHOD, MEMBER_METHOD, classify};
