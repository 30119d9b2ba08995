//! Error types for ipstash
//!
//! Every failure is terminal for the current run. Nothing in the library
//! retries; the external scheduler re-invokes the whole process instead.

use thiserror::Error;

/// Result type alias for ipstash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ipstash
#[derive(Error, Debug)]
pub enum Error {
    /// The fetch endpoint could not be reached or answered with an error status
    #[error("failed to fetch IP from {url}: {reason}")]
    FetchFailed {
        /// Endpoint that was queried
        url: String,
        /// Transport-level cause
        reason: String,
    },

    /// The fetched value is not an IP literal
    #[error("invalid IP format received: {raw:?}")]
    InvalidIpFormat {
        /// The raw, untrimmed value that was received
        raw: String,
    },

    /// The broker was unreachable or rejected the operation
    #[error("failed to propagate IP to '{target}': {reason}")]
    PublishFailed {
        /// Channel or key name the operation targeted
        target: String,
        /// Broker-side cause
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error category, used to pick log wording and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FetchFailed,
    InvalidIpFormat,
    PublishFailed,
    ConfigInvalid,
    Other,
}

impl Error {
    /// Create a fetch error
    pub fn fetch_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid format error from the raw received value
    pub fn invalid_ip_format(raw: impl Into<String>) -> Self {
        Self::InvalidIpFormat { raw: raw.into() }
    }

    /// Create a publish error
    pub fn publish_failed(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::PublishFailed {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FetchFailed { .. } => ErrorKind::FetchFailed,
            Self::InvalidIpFormat { .. } => ErrorKind::InvalidIpFormat,
            Self::PublishFailed { .. } => ErrorKind::PublishFailed,
            Self::Config(_) => ErrorKind::ConfigInvalid,
            Self::Json(_) => ErrorKind::Other,
        }
    }
}
