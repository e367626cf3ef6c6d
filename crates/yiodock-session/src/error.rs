//! Error types for the session layer.

use crate::ConnectionState;

/// Errors that can occur in the session layer.
///
/// Link failures are not errors here: they are events that drive the state
/// machine into recovery. These variants cover what a caller can get wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A device command was requested while the session is not
    /// authenticated with the dock.
    #[error("not authenticated with the dock (state: {0})")]
    NotAuthenticated(ConnectionState),

    /// The session has been disposed and accepts no further requests.
    #[error("session disposed")]
    Disposed,

    /// The configured host does not form a usable `ws://host:port` address.
    #[error("invalid dock address: {0}")]
    InvalidAddress(String),
}
