//! Frame codec.
//!
//! Inbound socket messages are [`PushFrame`]s. A data frame (`msg`) carries
//! a [`Response`] batch, usually gzip-compressed; heartbeats and acks carry
//! no batch. Outbound the client only writes heartbeat and ack frames.

use std::io::Read;

use flate2::read::GzDecoder;
use livetap_core::DecodeError;
use prost::Message as _;

use crate::proto::{HeadersList, PushFrame, Response};

/// Gzip stream magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest payload a compressed frame may inflate to.
pub const MAX_INFLATED_LEN: u64 = 16 * 1024 * 1024;

/// Kind of a push frame, from its `payload_type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Message batch.
    Data,
    /// Keepalive.
    Heartbeat,
    /// Acknowledgment.
    Ack,
    /// Anything else (the server sends `close` before dropping a room).
    Other(String),
}

impl FrameKind {
    /// Classify a `payload_type` value.
    pub fn from_payload_type(payload_type: &str) -> Self {
        match payload_type {
            "msg" => Self::Data,
            "hb" => Self::Heartbeat,
            "ack" => Self::Ack,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A decoded inbound frame.
#[derive(Clone, Debug)]
pub struct Envelope {
    /// Correlation id, echoed by the ack.
    pub log_id: u64,
    /// Frame kind.
    pub kind: FrameKind,
    /// Message batch; empty for non-data frames.
    pub response: Response,
}

impl Envelope {
    /// Whether the server asked for an acknowledgment of this frame.
    pub fn needs_ack(&self) -> bool {
        self.response.need_ack
    }

    /// Encoded ack frame for this envelope, if one was requested.
    pub fn ack(&self) -> Option<Vec<u8>> {
        self.needs_ack()
            .then(|| encode_ack(self.log_id, &self.response.internal_ext))
    }
}

/// Decode one binary socket message.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, DecodeError> {
    let frame = PushFrame::decode(bytes).map_err(|e| DecodeError::protobuf("PushFrame", e))?;
    let kind = FrameKind::from_payload_type(&frame.payload_type);

    let response = if kind == FrameKind::Data && !frame.payload.is_empty() {
        let raw = if is_gzipped(&frame) {
            gunzip(&frame.payload)?
        } else {
            frame.payload
        };
        Response::decode(raw.as_slice()).map_err(|e| DecodeError::protobuf("Response", e))?
    } else {
        Response::default()
    };

    Ok(Envelope {
        log_id: frame.log_id,
        kind,
        response,
    })
}

/// Inflate a gzip payload of at most [`MAX_INFLATED_LEN`] bytes.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    gunzip_bounded(data, MAX_INFLATED_LEN)
}

fn gunzip_bounded(data: &[u8], limit: u64) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = GzDecoder::new(data).take(limit.saturating_add(1));
    let mut out = Vec::with_capacity(data.len().saturating_mul(4));
    let _ = decoder
        .read_to_end(&mut out)
        .map_err(|e| DecodeError::Decompress(e.to_string()))?;
    if u64::try_from(out.len()).unwrap_or(u64::MAX) > limit {
        return Err(DecodeError::Decompress(format!(
            "payload inflates past {limit} bytes"
        )));
    }
    Ok(out)
}

/// Encode the ack for a data frame: its `log_id` plus the echoed
/// `internal_ext` context.
pub fn encode_ack(log_id: u64, internal_ext: &str) -> Vec<u8> {
    PushFrame {
        log_id,
        payload_type: "ack".into(),
        payload: internal_ext.as_bytes().to_vec(),
        ..PushFrame::default()
    }
    .encode_to_vec()
}

/// Encode the keepalive frame sent as a ping payload.
pub fn encode_heartbeat() -> Vec<u8> {
    PushFrame {
        payload_type: "hb".into(),
        ..PushFrame::default()
    }
    .encode_to_vec()
}

/// Encode a data frame around a message batch, gzip-compressed when asked.
///
/// The server side of the protocol; used by local test servers.
pub fn encode_data_frame(log_id: u64, response: &Response, gzip: bool) -> Vec<u8> {
    let body = response.encode_to_vec();
    let (payload, headers_list) = if gzip {
        let headers = vec![HeadersList {
            key: "compress_type".into(),
            value: "gzip".into(),
        }];
        (gzip_bytes(&body), headers)
    } else {
        (body, Vec::new())
    };
    PushFrame {
        log_id,
        payload_type: "msg".into(),
        payload_encoding: "pb".into(),
        headers_list,
        payload,
        ..PushFrame::default()
    }
    .encode_to_vec()
}

fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn is_gzipped(frame: &PushFrame) -> bool {
    frame
        .headers_list
        .iter()
        .any(|h| h.key == "compress_type" && h.value == "gzip")
        || frame.payload.starts_with(&GZIP_MAGIC)
}
