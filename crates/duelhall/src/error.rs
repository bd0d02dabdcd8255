//! Unified error type for duelhall.
//!
//! Only failures that stop the server or a connection show up here.
//! Rejected session actions, decode failures and provider outages are
//! answered on the wire or absorbed where they happen.

use duelhall_transport::TransportError;

/// Top-level error for the server and its binary.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuelError {
    /// Bind, accept, or a connection's outbound side closing.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A bad value in the environment or builder.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
