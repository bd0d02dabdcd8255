//! Error types for external providers.

use std::time::Duration;

/// Why a provider call produced nothing usable.
///
/// Callers never surface these to participants: search degrades to an
/// empty list and a missing animation is simply left out of the log.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The request never completed (DNS, connect, TLS, reset).
    #[error("provider request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {0}")]
    Status(u16),

    /// The body did not have the expected shape.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// No answer within the configured bound.
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Request(err)
        }
    }
}
