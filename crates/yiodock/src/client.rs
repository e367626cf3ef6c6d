//! The dock actor and its public handle.
//!
//! One Tokio task owns everything with mutable state: the [`Session`], both
//! supervisor timers, and the current link. It `select!`s over caller
//! commands, link reports, and timer ticks, and applies each one fully
//! (session transition plus every effect) before taking the next. The
//! outside world only ever holds a [`DockHandle`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use yiodock_protocol::{decode, encode, IrCode, Outbound};
use yiodock_session::{
    ConnectionState, DockStatus, Effect, Event, Request, Session, Supervision,
};
use yiodock_timer::PeriodicTimer;
use yiodock_transport::{ConnectionId, Connector, WebSocketConnector};

use crate::link::{self, Link, LinkEvent, LinkEventKind};
use crate::{DockConfig, DockError, DockEvent};

/// Capacity of the caller command channel.
const COMMAND_CHANNEL_SIZE: usize = 32;

/// Capacity of the event broadcast. Lagging subscribers lose the oldest.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Commands sent from a [`DockHandle`] to the actor.
enum Command {
    /// Authorize and send a device command.
    Request {
        request: Request,
        reply: oneshot::Sender<Result<(), DockError>>,
    },

    /// Tear down the session and stop the actor.
    Dispose { reply: oneshot::Sender<()> },
}

// ---------------------------------------------------------------------------
// DockClient
// ---------------------------------------------------------------------------

/// Entry point for starting a dock client.
///
/// # Example
///
/// ```rust,no_run
/// use yiodock::prelude::*;
///
/// # async fn run() -> Result<(), DockError> {
/// let dock = DockClient::spawn(DockConfig::new("192.168.1.20", "0"))?;
/// let mut status = dock.status();
/// while !status.borrow_and_update().is_online() {
///     status.changed().await.map_err(|_| DockError::Stopped)?;
/// }
/// dock.send_ir_code("4;0xE0E040BF;32;0").await?;
/// dock.dispose().await;
/// # Ok(())
/// # }
/// ```
pub struct DockClient;

impl DockClient {
    /// Spawns a client that talks WebSocket to the configured dock.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns [`DockError::Config`] if the host does not resolve to a
    /// usable address. Nothing is spawned in that case.
    pub fn spawn(config: DockConfig) -> Result<DockHandle, DockError> {
        let config = config.validated();
        let connector =
            WebSocketConnector::with_connect_timeout(config.connect_timeout());
        Self::spawn_with_connector(config, connector)
    }

    /// Spawns a client that dials through a custom [`Connector`].
    ///
    /// # Errors
    /// Same as [`spawn`](Self::spawn).
    pub fn spawn_with_connector<C: Connector>(
        config: DockConfig,
        connector: C,
    ) -> Result<DockHandle, DockError> {
        let config = config.validated();
        let address = config.address()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(DockStatus::Unknown);
        let (state_tx, state_rx) =
            watch::channel(ConnectionState::Uninitialized);
        let (events_tx, events_rx) = broadcast::channel(EVENT_CHANNEL_SIZE);

        let heartbeat =
            PeriodicTimer::new("heartbeat", config.heartbeat_interval());
        let reconnect =
            PeriodicTimer::new("reconnect", config.reconnect_interval());
        let actor = DockActor {
            session: Session::new(config.session_config()),
            connector: Arc::new(connector),
            link: None,
            next_link: 0,
            heartbeat,
            reconnect,
            commands: command_rx,
            link_tx,
            link_rx,
            status: status_tx,
            state: state_tx,
            events: events_tx,
        };

        tracing::info!(%address, "starting dock client");
        tokio::spawn(actor.run());

        Ok(DockHandle {
            commands: command_tx,
            status: status_rx,
            state: state_rx,
            events: events_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// DockHandle
// ---------------------------------------------------------------------------

/// Handle to a running dock client.
///
/// Cheap to clone. The client keeps running as long as at least one handle
/// exists (or until [`dispose`](Self::dispose)); dropping the last handle
/// tears the session down.
pub struct DockHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<DockStatus>,
    state: watch::Receiver<ConnectionState>,
    /// Never read; only a template for [`subscribe`](Self::subscribe), so
    /// the actor stays the sole sender.
    events: broadcast::Receiver<DockEvent>,
}

impl Clone for DockHandle {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            status: self.status.clone(),
            state: self.state.clone(),
            events: self.events.resubscribe(),
        }
    }
}

impl DockHandle {
    /// Asks the dock to emit an IR code.
    ///
    /// The code is validated before anything is queued. Sending is
    /// fire-and-forget: the dock's acknowledgement arrives later as a
    /// [`DockEvent::StatusText`].
    ///
    /// # Errors
    /// - [`DockError::Protocol`] if `code` is not a canonical IR code.
    /// - [`DockError::Session`] if the client is not authenticated.
    /// - [`DockError::Stopped`] if the client has stopped.
    pub async fn send_ir_code(&self, code: &str) -> Result<(), DockError> {
        let code = IrCode::parse(code).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected IR code");
        })?;
        self.request(Request::SendIrCode(code)).await
    }

    /// Switches the dock's IR receiver on or off.
    ///
    /// # Errors
    /// Same as [`send_ir_code`](Self::send_ir_code), minus validation.
    pub async fn set_ir_receiver(&self, on: bool) -> Result<(), DockError> {
        self.request(Request::SetIrReceiver(on)).await
    }

    /// Disarms both timers, closes the link, and stops the client.
    ///
    /// Waits for the client to acknowledge. Safe to call repeatedly and
    /// after the client has already stopped.
    pub async fn dispose(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .commands
            .send(Command::Dispose { reply: reply_tx })
            .await
            .is_err()
        {
            return;
        }
        let _ = reply_rx.await;
    }

    /// A receiver that always holds the latest [`DockStatus`].
    pub fn status(&self) -> watch::Receiver<DockStatus> {
        self.status.clone()
    }

    /// Subscribes to every [`DockEvent`] from now on.
    ///
    /// The receiver reports [`RecvError::Closed`] once the client stops.
    ///
    /// [`RecvError::Closed`]: broadcast::error::RecvError::Closed
    pub fn subscribe(&self) -> broadcast::Receiver<DockEvent> {
        self.events.resubscribe()
    }

    /// The session's current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns `true` once the client task has exited.
    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }

    async fn request(&self, request: Request) -> Result<(), DockError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Request {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| DockError::Stopped)?;
        reply_rx.await.map_err(|_| DockError::Stopped)?
    }
}

// ---------------------------------------------------------------------------
// DockActor
// ---------------------------------------------------------------------------

/// The internal client state. Runs inside a Tokio task.
struct DockActor<C: Connector> {
    session: Session,
    connector: Arc<C>,
    /// The current link. Reports from any other link are stale.
    link: Option<Link>,
    next_link: u64,
    heartbeat: PeriodicTimer,
    reconnect: PeriodicTimer,
    commands: mpsc::Receiver<Command>,
    /// Cloned into every link task; held here so `link_rx` never closes.
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    status: watch::Sender<DockStatus>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<DockEvent>,
}

impl<C: Connector> DockActor<C> {
    /// Runs the actor loop until dispose or until every handle is dropped.
    async fn run(mut self) {
        tracing::info!("dock actor started");
        self.apply(Event::Start);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("all dock handles dropped");
                        self.dispose();
                        break;
                    };
                    match command {
                        Command::Request { request, reply } => {
                            let _ = reply.send(self.handle_request(request));
                        }
                        Command::Dispose { reply } => {
                            self.dispose();
                            let _ = reply.send(());
                            break;
                        }
                    }
                }
                Some(event) = self.link_rx.recv() => {
                    self.on_link_event(event);
                }
                tick = self.heartbeat.wait_for_tick() => {
                    self.on_tick(Event::HeartbeatTick, tick);
                }
                tick = self.reconnect.wait_for_tick() => {
                    self.on_tick(Event::ReconnectTick, tick);
                }
            }
        }

        tracing::info!(
            heartbeats = self.heartbeat.metrics().total_ticks,
            reconnects = self.reconnect.metrics().times_armed,
            "dock actor stopped"
        );
    }

    /// Feeds one event to the session and carries out its effects.
    fn apply(&mut self, event: Event) {
        let effects = self.session.handle(event);
        self.execute(effects);
        self.publish_state();
    }

    fn dispose(&mut self) {
        let effects = self.session.dispose();
        self.execute(effects);
        self.publish_state();
        tracing::info!("dock client disposed");
    }

    fn handle_request(&mut self, request: Request) -> Result<(), DockError> {
        let outbound = self.session.request(request)?;
        self.send(&outbound)
    }

    fn on_link_event(&mut self, event: LinkEvent) {
        if self.link.as_ref().map(Link::id) != Some(event.link) {
            tracing::trace!(
                link = %event.link,
                "report from stale link dropped"
            );
            return;
        }

        let event = match event.kind {
            LinkEventKind::Connected => Event::Connected,
            LinkEventKind::Text(text) => Event::Message(decode(&text)),
            // The task has exited for the remaining kinds.
            LinkEventKind::ConnectFailed(reason) => {
                self.link = None;
                Event::ConnectFailed(reason)
            }
            LinkEventKind::Closed => {
                self.link = None;
                Event::Closed
            }
            LinkEventKind::Error(reason) => {
                self.link = None;
                Event::Error(reason)
            }
        };
        self.apply(event);
    }

    fn on_tick(&mut self, event: Event, tick: u64) {
        tracing::trace!(?event, tick, "supervisor tick");
        self.apply(event);
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Connect { address } => self.open_link(address),
                Effect::CloseLink => {
                    if let Some(link) = self.link.take() {
                        tracing::debug!(link = %link.id(), "closing link");
                    }
                }
                Effect::Send(outbound) => {
                    if let Err(e) = self.send(&outbound) {
                        tracing::warn!(
                            error = %e,
                            kind = outbound.kind(),
                            "failed to encode request"
                        );
                    }
                }
                Effect::Supervise(regime) => self.supervise(regime),
                Effect::Status(status) => {
                    tracing::info!(%status, "dock status changed");
                    self.status.send_replace(status.clone());
                    self.broadcast(DockEvent::Status(status));
                }
                Effect::StatusText(text) => {
                    self.broadcast(DockEvent::StatusText(text));
                }
                Effect::ValueChanged => self.broadcast(DockEvent::ValueChanged),
                Effect::IrReceived(code) => {
                    tracing::debug!(%code, "IR code received");
                    self.broadcast(DockEvent::IrReceived(code));
                }
            }
        }
    }

    fn open_link(&mut self, address: String) {
        self.next_link += 1;
        let id = ConnectionId::new(self.next_link);
        if let Some(old) = self.link.take() {
            tracing::debug!(link = %old.id(), "replacing link");
        }
        self.link = Some(link::spawn_link(
            Arc::clone(&self.connector),
            id,
            address,
            self.link_tx.clone(),
        ));
    }

    /// Encodes and queues a request on the current link.
    fn send(&mut self, outbound: &Outbound) -> Result<(), DockError> {
        let text = encode(outbound)?;
        match &self.link {
            Some(link) if link.send(text) => {
                tracing::debug!(
                    link = %link.id(),
                    kind = outbound.kind(),
                    "request queued"
                );
            }
            _ => {
                tracing::debug!(
                    kind = outbound.kind(),
                    "no open link, request dropped"
                );
            }
        }
        Ok(())
    }

    /// Arms exactly the timer for `regime`. Disarming first keeps the two
    /// timers from ever being armed together.
    fn supervise(&mut self, regime: Supervision) {
        match regime {
            Supervision::Idle => {
                self.heartbeat.disarm();
                self.reconnect.disarm();
            }
            Supervision::Heartbeat => {
                self.reconnect.disarm();
                self.heartbeat.arm();
            }
            Supervision::Reconnect => {
                self.heartbeat.disarm();
                self.reconnect.arm();
            }
        }
        tracing::debug!(?regime, "supervision");
    }

    fn broadcast(&self, event: DockEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_state(&self) {
        let state = self.session.state();
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}
