//! Error taxonomy for the ingestion client.
//!
//! Each failure domain gets its own enum so callers can match on exactly the
//! cases they handle:
//!
//! - [`SignatureError`]: the scripted signer is unavailable or failed
//! - [`IdentityError`]: anti-bot token or room id could not be resolved
//! - [`SocketError`]: the push socket could not be opened, written or read
//! - [`DecodeError`]: one inbound frame or message is malformed
//! - [`RelayError`]: a downstream sink rejected an event
//! - [`SessionError`]: why a connection attempt (or the whole run) ended
//!
//! [`SessionError::category`] gives a short, stable label used as a metrics
//! tag and as the notice prefix.

use std::time::Duration;

use thiserror::Error;

/// The external signer could not produce a signature.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The signing script could not be read or the runtime could not start.
    #[error("signing script unavailable: {0}")]
    ScriptUnavailable(String),
    /// The script ran but its function raised or exited non-zero.
    #[error("signing script failed: {0}")]
    ScriptFailed(String),
    /// The script did not finish in time.
    #[error("signing script timed out after {0:?}")]
    Timeout(Duration),
    /// The script produced no output.
    #[error("signing script returned an empty signature")]
    EmptySignature,
}

/// Room identity resolution failed.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The root page answered but carried no `ttwid` cookie.
    #[error("anti-bot token missing from response cookies")]
    TokenMissing,
    /// The room page did not contain a room id.
    #[error("room id not found in page for '{live_id}'")]
    RoomIdNotFound {
        /// The external room handle that was looked up.
        live_id: String,
    },
    /// The HTTP request itself failed.
    #[error("identity request to {url} failed: {message}")]
    Http {
        /// Request URL.
        url: String,
        /// Transport or status error.
        message: String,
    },
}

/// Push socket failure.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The handshake request could not be built (bad URL or header value).
    #[error("invalid handshake request: {0}")]
    InvalidRequest(String),
    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),
    /// Reading from the socket failed.
    #[error("receive failed: {0}")]
    Receive(String),
}

/// A single inbound frame or message could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Protobuf decoding failed.
    #[error("malformed {what}: {message}")]
    Protobuf {
        /// Which message type was being decoded.
        what: &'static str,
        /// Decoder error text.
        message: String,
    },
    /// The gzip payload could not be inflated.
    #[error("payload decompression failed: {0}")]
    Decompress(String),
}

impl DecodeError {
    /// Build a protobuf decode error for the named message type.
    pub fn protobuf(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Protobuf {
            what,
            message: err.to_string(),
        }
    }
}

/// A downstream sink could not accept an event.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The sink answered with a non-success status.
    #[error("relay rejected event with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// The request did not complete.
    #[error("relay transport error: {0}")]
    Transport(String),
    /// All attempts failed; the event was dropped.
    #[error("relay gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        last: String,
    },
}

/// Why a connection attempt, or the whole run, ended with an error.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No signature could be produced for this attempt.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// Room identity could not be resolved for this attempt.
    #[error(transparent)]
    Identity(#[from] IdentityError),
    /// The socket could not be opened.
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// Too many consecutive failed attempts.
    #[error("gave up after {attempts} consecutive failed connection attempts")]
    RetriesExhausted {
        /// Number of consecutive failures.
        attempts: u32,
    },
}

impl SessionError {
    /// Short stable label for metrics and notices.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Signature(_) => "signature",
            Self::Identity(_) => "identity",
            Self::Socket(_) => "socket",
            Self::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    /// Whether the supervising loop should try again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::RetriesExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn signature_error_display() {
        let err = SignatureError::ScriptUnavailable("sign.js: not found".into());
        assert_eq!(err.to_string(), "signing script unavailable: sign.js: not found");
    }

    #[test]
    fn identity_error_display_names_room() {
        let err = IdentityError::RoomIdNotFound {
            live_id: "261378947940".into(),
        };
        assert!(err.to_string().contains("261378947940"));
    }

    #[test]
    fn session_error_wraps_domain_errors() {
        let err: SessionError = SocketError::Connect("refused".into()).into();
        assert_matches!(err, SessionError::Socket(SocketError::Connect(_)));
        assert_eq!(err.category(), "socket");
        assert!(err.is_retryable());
    }

    #[test]
    fn session_error_transparent_display() {
        let err: SessionError = SignatureError::EmptySignature.into();
        assert_eq!(err.to_string(), "signing script returned an empty signature");
        assert_eq!(err.category(), "signature");
    }

    #[test]
    fn retries_exhausted_is_terminal() {
        let err = SessionError::RetriesExhausted { attempts: 5 };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), "retries_exhausted");
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn decode_error_helper() {
        let err = DecodeError::protobuf("PushFrame", "buffer underflow");
        assert_eq!(err.to_string(), "malformed PushFrame: buffer underflow");
    }

    #[test]
    fn relay_error_exhausted_display() {
        let err = RelayError::Exhausted {
            attempts: 3,
            last: "relay rejected event with status 500".into(),
        };
        assert!(err.to_string().starts_with("relay gave up after 3 attempts"));
    }
}
