//! Reconnection supervisor decisions.
//!
//! The reconnect timer is armed only while recovering. Each tick in a
//! failure state redials; there is no retry cap, the fixed period is the
//! only throttle. A recovery attempt that is still unauthenticated when the
//! next tick arrives has had a full period and is redialed too, so a dock
//! that accepts TCP but never speaks cannot stall recovery.
//!
//! The first attempt after start runs with no timer armed. A dock that
//! accepts that connection and stays silent leaves the session waiting in
//! `ConnectionEstablished` until the link closes or errors.

use crate::{ConnectionState, Supervision};

/// What a reconnect tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReconnectAction {
    /// Close the old link and dial again.
    Retry,
    /// Authenticated again: the reconnect timer must be disarmed.
    StandDown,
    /// Nothing to do on this tick.
    Wait,
}

pub(crate) fn decide(
    state: ConnectionState,
    supervision: Supervision,
) -> ReconnectAction {
    if state.is_authenticated() {
        ReconnectAction::StandDown
    } else if state.is_failed() {
        ReconnectAction::Retry
    } else if state.is_connecting() && supervision == Supervision::Reconnect {
        ReconnectAction::Retry
    } else {
        ReconnectAction::Wait
    }
}
