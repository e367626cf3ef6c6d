//! The session state machine.
//!
//! A [`Session`] is the single source of truth for one logical connection
//! to the dock. It is mutated only through [`Session::handle`] (one event
//! in, a list of effects out), [`Session::dispose`], and the read-only
//! [`Session::request`] check. The owner applies events one at a time, so
//! the session never observes two events concurrently and needs no locks.

use yiodock_protocol::{AccessToken, InboundMessage, Outbound};

use crate::heartbeat::{self, HeartbeatAction};
use crate::reconnect::{self, ReconnectAction};
use crate::{
    resolve_address, ConnectionState, DockStatus, Effect, Event,
    OfflineReason, Request, SessionError, Supervision,
};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// What the session needs to reach and authenticate with the dock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Hostname or IP of the dock.
    pub host: String,
    /// WebSocket port. The dock always listens on 946.
    pub port: u16,
    /// Credential presented in the auth request.
    pub access_token: AccessToken,
}

impl SessionConfig {
    pub const DEFAULT_PORT: u16 = 946;

    pub fn new(
        host: impl Into<String>,
        access_token: impl Into<AccessToken>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            access_token: access_token.into(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(String::new(), AccessToken::default())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One logical connection to the dock.
///
/// ## Lifecycle
///
/// ```text
/// Start ─→ Connect ─→ Connected ─→ auth_required ─→ (send auth) ─→ auth_ok
///                                                                    │
///   ┌────────────────────── heartbeat ticks ◄────────────────────────┘
///   ▼
/// probe / check ──(no reply)─→ CommunicationError ──(reconnect tick)─→ Connect
/// ```
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    state: ConnectionState,
    /// Resolved `ws://` address of the current (or last) link.
    address: Option<String>,
    /// Set by `auth_ok`; reset whenever a new link is opened.
    authenticated: bool,
    /// Set by any liveness-confirming message; cleared by each probe.
    liveness: bool,
    status_text: Option<String>,
    status: DockStatus,
    supervision: Supervision,
    disposed: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Uninitialized,
            address: None,
            authenticated: false,
            liveness: false,
            status_text: None,
            status: DockStatus::Unknown,
            supervision: Supervision::Idle,
            disposed: false,
        }
    }

    /// Applies one event and returns the effects to carry out, in order.
    ///
    /// Total over every (state, event) pair: combinations without a
    /// defined transition leave the session unchanged and return no
    /// effects. After [`dispose`](Self::dispose) every event is ignored.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.disposed {
            tracing::trace!(?event, "session disposed, event ignored");
            return effects;
        }

        let before = self.state;
        match event {
            Event::Start => self.on_start(&mut effects),
            Event::Connected => self.on_connected(),
            Event::ConnectFailed(reason) => {
                self.on_connect_failed(&reason, &mut effects)
            }
            Event::Message(message) => self.on_message(message, &mut effects),
            Event::Closed => {
                self.on_link_lost("connection closed", &mut effects)
            }
            Event::Error(reason) => self.on_link_lost(&reason, &mut effects),
            Event::HeartbeatTick => self.on_heartbeat_tick(&mut effects),
            Event::ReconnectTick => self.on_reconnect_tick(&mut effects),
        }

        if self.state != before {
            tracing::debug!(
                from = %before,
                to = %self.state,
                "session transition"
            );
        }
        effects
    }

    /// Checks whether a device command may be sent now and returns the
    /// request to send.
    ///
    /// # Errors
    /// - [`SessionError::Disposed`] after dispose.
    /// - [`SessionError::NotAuthenticated`] outside the authenticated states.
    pub fn request(&self, request: Request) -> Result<Outbound, SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        if !self.state.is_authenticated() {
            return Err(SessionError::NotAuthenticated(self.state));
        }
        Ok(match request {
            Request::SendIrCode(code) => Outbound::SendIrCode { code },
            Request::SetIrReceiver(on) => Outbound::SetIrReceiver { on },
        })
    }

    /// Tears the session down: disarm both timers, then close the link.
    ///
    /// Returns those effects the first time and nothing afterwards, so
    /// calling it repeatedly is harmless.
    pub fn dispose(&mut self) -> Vec<Effect> {
        if self.disposed {
            return Vec::new();
        }
        self.disposed = true;
        self.authenticated = false;
        self.liveness = false;
        self.supervision = Supervision::Idle;
        tracing::debug!(state = %self.state, "session disposed");
        vec![Effect::Supervise(Supervision::Idle), Effect::CloseLink]
    }

    // -- Accessors ----------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn status(&self) -> &DockStatus {
        &self.status
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    pub fn supervision(&self) -> Supervision {
        self.supervision
    }

    /// The address of the current (or last attempted) link.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// The liveness flag: whether the dock replied since the last probe.
    pub fn liveness(&self) -> bool {
        self.liveness
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // -- Transitions --------------------------------------------------------

    fn on_start(&mut self, effects: &mut Vec<Effect>) {
        if self.state != ConnectionState::Uninitialized {
            tracing::warn!(state = %self.state, "session already started");
            return;
        }
        self.open_link(effects);
    }

    fn on_connected(&mut self) {
        if self.state.is_connecting() {
            self.state = ConnectionState::ConnectionEstablished;
            tracing::info!(address = ?self.address, "connected to dock");
        } else {
            tracing::trace!(state = %self.state, "connect report ignored");
        }
    }

    fn on_connect_failed(&mut self, reason: &str, effects: &mut Vec<Effect>) {
        if !self.state.is_connecting() {
            tracing::trace!(state = %self.state, "connect failure ignored");
            return;
        }
        tracing::debug!(reason, "connect attempt failed");
        // While recovering, stay in the state the reconnect loop retries from.
        let next = if self.supervision == Supervision::Reconnect {
            ConnectionState::CommunicationError
        } else {
            ConnectionState::ConnectionFailed
        };
        self.fail(next, format!("connection failed: {reason}"), effects);
    }

    fn on_message(
        &mut self,
        message: InboundMessage,
        effects: &mut Vec<Effect>,
    ) {
        let Some(text) = message.status_text() else {
            return;
        };

        if message.confirms_liveness() {
            self.liveness = true;
        }
        if message == InboundMessage::AuthOk {
            self.authenticated = true;
        }

        self.status_text = Some(text.clone());
        effects.push(Effect::StatusText(Some(text)));
        effects.push(Effect::ValueChanged);
        if let InboundMessage::IrReceive { code: Some(code) } = &message {
            effects.push(Effect::IrReceived(code.clone()));
        }

        match self.state {
            ConnectionState::ConnectionEstablished => {
                effects.push(Effect::Send(Outbound::Authenticate {
                    token: self.config.access_token.clone(),
                }));
                self.state = ConnectionState::AuthenticationInProgress;
                // An auth_ok that raced ahead of our request still counts.
                if self.authenticated {
                    self.complete_authentication(effects);
                }
            }
            ConnectionState::AuthenticationInProgress => {
                if self.authenticated {
                    self.complete_authentication(effects);
                } else {
                    tracing::warn!(
                        ?message,
                        "dock did not accept authentication"
                    );
                    self.fail(
                        ConnectionState::AuthenticationFailed,
                        "authentication failed".into(),
                        effects,
                    );
                }
            }
            ConnectionState::CommunicationError => {
                self.supervise(Supervision::Reconnect, effects);
            }
            _ => {}
        }
    }

    fn on_link_lost(&mut self, reason: &str, effects: &mut Vec<Effect>) {
        match self.state {
            // No link exists in these states.
            ConnectionState::Uninitialized
            | ConnectionState::ReconnectionInProgress => {
                tracing::trace!(state = %self.state, "link loss ignored");
            }
            state if state.is_failed() => {
                self.supervise(Supervision::Reconnect, effects);
            }
            _ => {
                tracing::warn!(
                    reason,
                    state = %self.state,
                    "link to dock lost"
                );
                self.fail(
                    ConnectionState::CommunicationError,
                    reason.to_owned(),
                    effects,
                );
            }
        }
    }

    fn on_heartbeat_tick(&mut self, effects: &mut Vec<Effect>) {
        match heartbeat::decide(self.state, self.liveness) {
            HeartbeatAction::Probe => {
                self.liveness = false;
                effects.push(Effect::Send(Outbound::Heartbeat));
                self.state = ConnectionState::CheckPong;
            }
            HeartbeatAction::Healthy => {
                tracing::debug!("heartbeat ok");
                effects.push(Effect::StatusText(self.status_text.clone()));
                self.state = ConnectionState::SendPing;
            }
            HeartbeatAction::LinkDead => {
                tracing::warn!("no heartbeat reply from dock");
                self.fail(
                    ConnectionState::CommunicationError,
                    "no heartbeat reply from dock".into(),
                    effects,
                );
                self.status_text = None;
                effects.push(Effect::StatusText(None));
            }
            HeartbeatAction::Ignore => {
                tracing::trace!(state = %self.state, "heartbeat tick ignored");
            }
        }
    }

    fn on_reconnect_tick(&mut self, effects: &mut Vec<Effect>) {
        match reconnect::decide(self.state, self.supervision) {
            ReconnectAction::Retry => {
                tracing::info!(state = %self.state, "reconnecting to dock");
                effects.push(Effect::CloseLink);
                self.state = ConnectionState::ReconnectionInProgress;
                self.open_link(effects);
            }
            ReconnectAction::StandDown => {
                // Re-assert the steady-state regime, which disarms the
                // reconnect timer.
                effects.push(Effect::Supervise(self.supervision));
            }
            ReconnectAction::Wait => {
                tracing::trace!(state = %self.state, "reconnect tick ignored");
            }
        }
    }

    // -- Helpers ------------------------------------------------------------

    /// Resolves the address and asks for a fresh link.
    fn open_link(&mut self, effects: &mut Vec<Effect>) {
        match resolve_address(&self.config.host, self.config.port) {
            Ok(address) => {
                self.authenticated = false;
                self.liveness = false;
                self.address = Some(address.clone());
                self.state = ConnectionState::AuthenticationInProgress;
                effects.push(Effect::Connect { address });
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot resolve dock address");
                self.supervise(Supervision::Idle, effects);
                self.set_status(
                    DockStatus::Offline(OfflineReason::ConfigurationError(
                        e.to_string(),
                    )),
                    effects,
                );
            }
        }
    }

    fn complete_authentication(&mut self, effects: &mut Vec<Effect>) {
        self.state = ConnectionState::AuthenticationComplete;
        tracing::info!("authenticated with dock");
        self.set_status(DockStatus::Online, effects);
        self.supervise(Supervision::Heartbeat, effects);
    }

    /// Enters a failure state, goes offline, and hands over to the
    /// reconnection supervisor.
    fn fail(
        &mut self,
        state: ConnectionState,
        reason: String,
        effects: &mut Vec<Effect>,
    ) {
        self.state = state;
        self.set_status(
            DockStatus::Offline(OfflineReason::CommunicationError(reason)),
            effects,
        );
        self.supervise(Supervision::Reconnect, effects);
    }

    fn set_status(&mut self, status: DockStatus, effects: &mut Vec<Effect>) {
        if self.status != status {
            self.status = status.clone();
            effects.push(Effect::Status(status));
        }
    }

    fn supervise(&mut self, regime: Supervision, effects: &mut Vec<Effect>) {
        if self.supervision != regime {
            self.supervision = regime;
            effects.push(Effect::Supervise(regime));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionConfig::new("dock.local", "0"))
    }

    #[test]
    fn test_new_session_is_uninitialized() {
        let s = session();
        assert_eq!(s.state(), ConnectionState::Uninitialized);
        assert_eq!(s.status(), &DockStatus::Unknown);
        assert_eq!(s.supervision(), Supervision::Idle);
        assert_eq!(s.address(), None);
        assert!(!s.is_disposed());
    }

    #[test]
    fn test_start_resolves_and_connects() {
        let mut s = session();
        let effects = s.handle(Event::Start);
        assert_eq!(
            effects,
            vec![Effect::Connect {
                address: "ws://dock.local:946/".into()
            }]
        );
        assert_eq!(s.state(), ConnectionState::AuthenticationInProgress);
        assert_eq!(s.address(), Some("ws://dock.local:946/"));
    }

    #[test]
    fn test_start_twice_is_ignored() {
        let mut s = session();
        s.handle(Event::Start);
        assert!(s.handle(Event::Start).is_empty());
    }

    #[test]
    fn test_unrecognized_message_has_no_effects() {
        let mut s = session();
        s.handle(Event::Start);
        s.handle(Event::Connected);
        let effects = s.handle(Event::Message(InboundMessage::Unrecognized));
        assert!(effects.is_empty());
        assert_eq!(s.state(), ConnectionState::ConnectionEstablished);
    }

    #[test]
    fn test_status_is_only_emitted_on_change() {
        let mut s = session();
        let mut effects = Vec::new();
        s.set_status(DockStatus::Online, &mut effects);
        s.set_status(DockStatus::Online, &mut effects);
        assert_eq!(effects, vec![Effect::Status(DockStatus::Online)]);
    }

    #[test]
    fn test_dispose_order_and_idempotence() {
        let mut s = session();
        assert_eq!(
            s.dispose(),
            vec![Effect::Supervise(Supervision::Idle), Effect::CloseLink]
        );
        assert!(s.dispose().is_empty());
        assert!(s.handle(Event::Start).is_empty());
        assert_eq!(
            s.request(Request::SetIrReceiver(true)),
            Err(SessionError::Disposed)
        );
    }
}
