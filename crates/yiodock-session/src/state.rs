//! Session states, supervision regimes, and the outward connectivity status.

use std::fmt;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where the session is in the connection lifecycle.
///
/// ```text
///  *Uninitialized ─→ AuthenticationInProgress ⇄ ConnectionEstablished
///                          │
///                          ▼
///                 AuthenticationComplete ─→ CheckPong ⇄ SendPing
///                          │                    │
///                          ▼                    ▼
///                  CommunicationError ←─────────┘
///                          │
///                          ▼
///               ReconnectionInProgress ─→ AuthenticationInProgress (cycle)
/// ```
///
/// `ConnectionFailed` and `AuthenticationFailed` are dead ends until the
/// reconnection supervisor's next tick. There is no terminal state: the
/// machine cycles for as long as the client is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Nothing has happened yet.
    #[default]
    Uninitialized,
    /// The address resolved and a link is being opened or authenticated.
    AuthenticationInProgress,
    /// The transport is up; the next message triggers the auth request.
    ConnectionEstablished,
    /// The transport could not be opened.
    ConnectionFailed,
    /// The dock answered the auth request with something other than `auth_ok`.
    AuthenticationFailed,
    /// Authenticated; the first heartbeat probe has not gone out yet.
    AuthenticationComplete,
    /// Authenticated; the next heartbeat tick sends a probe.
    SendPing,
    /// Authenticated; the next heartbeat tick checks for a reply.
    CheckPong,
    /// The link is considered dead; waiting for the reconnect tick.
    CommunicationError,
    /// The old link is being torn down and the address re-resolved.
    ReconnectionInProgress,
}

impl ConnectionState {
    /// `true` for the steady-state states where device commands are allowed
    /// and the heartbeat supervisor is in charge.
    pub fn is_authenticated(self) -> bool {
        matches!(
            self,
            Self::AuthenticationComplete | Self::SendPing | Self::CheckPong
        )
    }

    /// `true` while a link attempt is open but not yet authenticated.
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            Self::AuthenticationInProgress | Self::ConnectionEstablished
        )
    }

    /// `true` for the failure states a reconnect tick acts on.
    pub fn is_failed(self) -> bool {
        matches!(
            self,
            Self::CommunicationError
                | Self::ConnectionFailed
                | Self::AuthenticationFailed
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::AuthenticationInProgress => "authentication in progress",
            Self::ConnectionEstablished => "connection established",
            Self::ConnectionFailed => "connection failed",
            Self::AuthenticationFailed => "authentication failed",
            Self::AuthenticationComplete => "authentication complete",
            Self::SendPing => "send ping",
            Self::CheckPong => "check pong",
            Self::CommunicationError => "communication error",
            Self::ReconnectionInProgress => "reconnection in progress",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Supervision
// ---------------------------------------------------------------------------

/// Which supervisor timer is armed.
///
/// Steady state and recovery are mutually exclusive, so this is a single
/// enum rather than two independent flags: there is no way to express
/// "both timers armed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Supervision {
    /// Neither timer is armed.
    #[default]
    Idle,
    /// Only the heartbeat timer is armed.
    Heartbeat,
    /// Only the reconnect timer is armed.
    Reconnect,
}

// ---------------------------------------------------------------------------
// DockStatus
// ---------------------------------------------------------------------------

/// Why the dock is offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfflineReason {
    /// The link failed or the dock stopped answering. Recovered automatically.
    CommunicationError(String),
    /// The configured host is unusable. Needs reconfiguration.
    ConfigurationError(String),
}

/// Connectivity status as seen from outside the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DockStatus {
    /// No outcome yet.
    #[default]
    Unknown,
    /// Authenticated and supervised by the heartbeat.
    Online,
    /// Not usable, with the reason.
    Offline(OfflineReason),
}

impl DockStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for DockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("UNKNOWN"),
            Self::Online => f.write_str("ONLINE"),
            Self::Offline(OfflineReason::CommunicationError(reason)) => {
                write!(f, "OFFLINE (communication error: {reason})")
            }
            Self::Offline(OfflineReason::ConfigurationError(reason)) => {
                write!(f, "OFFLINE (configuration error: {reason})")
            }
        }
    }
}
