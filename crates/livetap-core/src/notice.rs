//! Human-readable status notices.
//!
//! The client reports its lifecycle (connected, disconnected, retry counts,
//! parse failures, relay outcomes) through a [`Notifier`]. Each [`Notice`]
//! carries a level whose marker prefixes the rendered line, so a plain text
//! consumer can tell failures from progress without parsing.

use serde::{Deserialize, Serialize};

/// Notice severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Progress or neutral information.
    Info,
    /// Something completed successfully.
    Success,
    /// Something failed.
    Error,
}

impl NoticeLevel {
    /// Marker printed in front of the message.
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Info => "[*]",
            Self::Success => "[ok]",
            Self::Error => "[x]",
        }
    }
}

/// One status line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Message text, without the marker.
    pub message: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// Failure notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Whether this notice reports a failure.
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.level.marker(), self.message)
    }
}

/// Receives status notices from the client.
///
/// Called from several tasks; implementations must be cheap and must not
/// block.
pub trait Notifier: Send + Sync {
    /// Report one notice.
    fn notify(&self, notice: Notice);
}

impl<F> Notifier for F
where
    F: Fn(Notice) + Send + Sync,
{
    fn notify(&self, notice: Notice) {
        self(notice);
    }
}

/// Default notifier: forwards notices to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::warn!(target: "livetap::notice", "{notice}"),
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(target: "livetap::notice", "{notice}");
            }
        }
    }
}
