//! Error types
//!
//! Three layers: `Error` for collaborator and startup failures, `CreateError`
//! for the readiness handshake (cloneable so it can fan out to every caller
//! waiting on the same reservation), and `RequestError` for the control
//! surface with its fixed error categories.

use std::time::Duration;

use thiserror::Error;

/// Crate-level error for collaborator and startup failures
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or validated
    #[error("configuration error: {0}")]
    Config(String),

    /// Relay service call failed
    #[error("relay service error: {0}")]
    Relay(String),

    /// Capture engine or session failure
    #[error("capture error: {0}")]
    Capture(String),

    /// Encoder process failure
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Underlying I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a stream creation attempt
///
/// Cloneable: the result is published on a `watch` channel shared by every
/// caller that lost the reservation race.
#[derive(Debug, Clone, Error)]
pub enum CreateError {
    /// The capture session never reported its first media chunk
    #[error("capture produced no media within {0:?}")]
    CaptureTimeout(Duration),

    /// The relay never reported an active producer for the stream
    #[error("relay reported no producer within {0:?}")]
    RelayTimeout(Duration),

    /// A resource failed or exited before the stream became ready
    #[error("stream setup failed: {0}")]
    Failed(String),
}

/// Error surfaced to a control-surface caller
#[derive(Debug, Error)]
pub enum RequestError {
    /// The url parameter is missing or not a usable page URL
    #[error("missing or invalid url parameter: {0}")]
    MissingParameter(String),

    /// A readiness signal missed its deadline
    #[error("{0}")]
    CreationTimeout(CreateError),

    /// Stream setup failed before readiness
    #[error("{0}")]
    CreationFailed(String),

    /// Unexpected internal state
    #[error("internal error: {0}")]
    Internal(String),
}

impl RequestError {
    /// Stable category string reported to clients
    pub fn category(&self) -> &'static str {
        match self {
            RequestError::MissingParameter(_) => "missing-parameter",
            RequestError::CreationTimeout(_) => "creation-timeout",
            RequestError::CreationFailed(_) => "creation-failed",
            RequestError::Internal(_) => "internal-error",
        }
    }
}

impl From<CreateError> for RequestError {
    fn from(err: CreateError) -> Self {
        match err {
            CreateError::CaptureTimeout(_) | CreateError::RelayTimeout(_) => {
                RequestError::CreationTimeout(err)
            }
            CreateError::Failed(msg) => RequestError::CreationFailed(msg),
        }
    }
}
