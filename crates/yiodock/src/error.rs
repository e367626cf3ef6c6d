//! Unified error type for the yiodock client.

use yiodock_protocol::ProtocolError;
use yiodock_session::SessionError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `yiodock` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]` attribute
/// on each variant auto-generates `From` impls, so the `?` operator converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DockError {
    /// The configuration does not describe a reachable dock.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A protocol-level error (invalid IR code, encode failure).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (not authenticated, disposed).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The client task is no longer running.
    #[error("dock client has stopped")]
    Stopped,
}
