//! API server errors.

use thiserror::Error;

/// The API server could not start or stopped abnormally.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the listen address failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The HTTP server loop failed.
    #[error("api server failed: {0}")]
    Serve(#[from] std::io::Error),
    /// The metrics recorder could not be installed.
    #[error("metrics recorder unavailable: {0}")]
    Metrics(String),
}
