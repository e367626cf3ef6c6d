//! Heartbeat supervisor decisions.
//!
//! Ticks alternate between two phases. On a *probe* tick the liveness flag
//! is cleared and a ping goes out; on the following *check* tick the flag
//! must have been set by some reply in between. Any liveness-confirming
//! message counts, not only a pong. One lost probe is therefore tolerated
//! and a dead link is detected within two periods.

use crate::ConnectionState;

/// What a heartbeat tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatAction {
    /// Clear liveness and send a probe.
    Probe,
    /// A reply arrived since the last probe.
    Healthy,
    /// No reply since the last probe: the link is dead.
    LinkDead,
    /// Not supervising in this state.
    Ignore,
}

pub(crate) fn decide(
    state: ConnectionState,
    liveness: bool,
) -> HeartbeatAction {
    match state {
        ConnectionState::AuthenticationComplete | ConnectionState::SendPing => {
            HeartbeatAction::Probe
        }
        ConnectionState::CheckPong if liveness => HeartbeatAction::Healthy,
        ConnectionState::CheckPong => HeartbeatAction::LinkDead,
        _ => HeartbeatAction::Ignore,
    }
}
