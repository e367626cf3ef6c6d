//! Integration tests for the dock client.
//!
//! Most tests run the real actor against an in-memory connector: every dial
//! shows up on a channel as an [`Attempt`], and the test plays the dock on
//! the other end. The clock is paused, so heartbeat and reconnect periods
//! pass instantly whenever the runtime is idle. One test at the end talks
//! to a real WebSocket server.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::{self, Instant};
use yiodock::prelude::*;
use yiodock::{Connection, ConnectionId, Connector, TransportError};

// =========================================================================
// In-memory transport
// =========================================================================

/// One dial by the client. `dock` is `None` when the dial was refused.
struct Attempt {
    at: Instant,
    dock: Option<DockSide>,
}

/// The dock's end of an in-memory connection.
struct DockSide {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl DockSide {
    fn say(&self, message: Value) {
        self.say_raw(&message.to_string());
    }

    fn say_raw(&self, text: &str) {
        self.to_client
            .send(text.to_owned())
            .expect("client end should be open");
    }

    /// Next frame from the client, or `None` once the client closed.
    async fn next_frame(&mut self) -> Option<Value> {
        let text =
            time::timeout(Duration::from_secs(600), self.from_client.recv())
                .await
                .expect("client should send or close")?;
        Some(serde_json::from_str(&text).expect("client should send JSON"))
    }

    async fn expect_frame(&mut self, expected: Value) {
        assert_eq!(self.next_frame().await, Some(expected));
    }

    async fn expect_closed(&mut self) {
        assert_eq!(self.next_frame().await, None, "client should have closed");
    }

    /// Plays a successful handshake, including the first heartbeat probe.
    async fn handshake(&mut self) {
        self.say(json!({"type": "auth_required"}));
        self.expect_frame(json!({"type": "auth", "token": "0"})).await;
        self.say(json!({"type": "auth_ok"}));
        self.expect_frame(ping()).await;
    }
}

struct MemoryConnection {
    id: ConnectionId,
    outgoing: mpsc::UnboundedSender<String>,
    incoming: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, text: &str) -> Result<(), TransportError> {
        self.outgoing.send(text.to_owned()).map_err(|_| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "dock hung up",
            ))
        })
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        Ok(self.incoming.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

struct MemoryConnector {
    attempts: mpsc::UnboundedSender<Attempt>,
    refuse: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(
        &self,
        address: &str,
    ) -> Result<MemoryConnection, TransportError> {
        assert!(address.starts_with("ws://dock.test:946"), "dialed {address}");
        let at = Instant::now();

        if self.refuse.load(Ordering::SeqCst) {
            let _ = self.attempts.send(Attempt { at, dock: None });
            return Err(TransportError::ConnectFailed(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }

        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        let _ = self.attempts.send(Attempt {
            at,
            dock: Some(DockSide {
                to_client,
                from_client,
            }),
        });
        Ok(MemoryConnection {
            id: ConnectionId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
            outgoing,
            incoming: Mutex::new(incoming),
        })
    }
}

// =========================================================================
// Helpers
// =========================================================================

struct Harness {
    dock: DockHandle,
    attempts: mpsc::UnboundedReceiver<Attempt>,
    refuse: Arc<AtomicBool>,
    started: Instant,
}

impl Harness {
    fn start() -> Self {
        Self::start_refusing(false)
    }

    fn start_refusing(refuse: bool) -> Self {
        let (attempts_tx, attempts) = mpsc::unbounded_channel();
        let refuse = Arc::new(AtomicBool::new(refuse));
        let connector = MemoryConnector {
            attempts: attempts_tx,
            refuse: Arc::clone(&refuse),
            next_id: AtomicU64::new(1),
        };
        let dock = DockClient::spawn_with_connector(
            DockConfig::new("dock.test", "0"),
            connector,
        )
        .expect("config should be valid");
        Self {
            dock,
            attempts,
            refuse,
            started: Instant::now(),
        }
    }

    async fn next_attempt(&mut self) -> Attempt {
        time::timeout(Duration::from_secs(600), self.attempts.recv())
            .await
            .expect("client should dial")
            .expect("connector should be alive")
    }

    async fn accepted(&mut self) -> DockSide {
        self.next_attempt()
            .await
            .dock
            .expect("dial should have been accepted")
    }

    /// Dials, handshakes, and waits until the client reports online.
    async fn online(&mut self) -> DockSide {
        let mut side = self.accepted().await;
        side.handshake().await;
        wait_for_status(&mut self.dock.status(), DockStatus::is_online).await;
        side
    }

    fn elapsed(&self, attempt: &Attempt) -> Duration {
        attempt.at - self.started
    }
}

fn ping() -> Value {
    json!({"type": "dock", "command": "ping"})
}

fn pong() -> Value {
    json!({"type": "dock", "message": "pong"})
}

async fn wait_for_status(
    status: &mut watch::Receiver<DockStatus>,
    predicate: impl Fn(&DockStatus) -> bool,
) {
    time::timeout(Duration::from_secs(600), status.wait_for(|s| predicate(s)))
        .await
        .expect("status should be reached in time")
        .expect("client should be running");
}

fn is_comm_error(status: &DockStatus) -> bool {
    matches!(
        status,
        DockStatus::Offline(OfflineReason::CommunicationError(_))
    )
}

/// Collects events that are already queued, without waiting.
fn drain(events: &mut broadcast::Receiver<DockEvent>) -> Vec<DockEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// =========================================================================
// Startup and handshake
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_handshake_brings_dock_online() {
    let mut h = Harness::start();
    let mut events = h.dock.subscribe();
    assert_eq!(*h.dock.status().borrow(), DockStatus::Unknown);

    let mut side = h.accepted().await;
    side.say(json!({"type": "auth_required"}));
    side.expect_frame(json!({"type": "auth", "token": "0"})).await;
    side.say(json!({"type": "auth_ok"}));

    // First heartbeat probe goes out right after authentication.
    side.expect_frame(ping()).await;
    assert_eq!(*h.dock.status().borrow(), DockStatus::Online);
    assert_eq!(h.dock.state(), ConnectionState::CheckPong);

    let seen = drain(&mut events);
    assert!(seen.contains(&DockEvent::StatusText(Some(
        "Authentication required".into()
    ))));
    assert!(seen.contains(&DockEvent::Status(DockStatus::Online)));
    assert!(seen.contains(&DockEvent::ValueChanged));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_host_is_rejected_before_spawning() {
    let (attempts, _rx) = mpsc::unbounded_channel();
    let connector = MemoryConnector {
        attempts,
        refuse: Arc::new(AtomicBool::new(false)),
        next_id: AtomicU64::new(1),
    };
    let result =
        DockClient::spawn_with_connector(DockConfig::new("", "0"), connector);
    assert!(matches!(
        result,
        Err(DockError::Config(ConfigError::MissingHost))
    ));
}

// =========================================================================
// Commands
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_commands_reach_the_dock_once_authenticated() {
    let mut h = Harness::start();
    let mut side = h.online().await;

    h.dock.send_ir_code("4;0xE0E040BF;32;0").await.unwrap();
    side.expect_frame(json!({
        "type": "dock",
        "command": "ir_send",
        "code": "4;0xE0E040BF;32;0",
        "format": "hex"
    }))
    .await;

    h.dock.set_ir_receiver(true).await.unwrap();
    side.expect_frame(json!({"type": "dock", "command": "ir_receive_on"}))
        .await;
    h.dock.set_ir_receiver(false).await.unwrap();
    side.expect_frame(json!({"type": "dock", "command": "ir_receive_off"}))
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_ir_code_is_rejected_and_not_sent() {
    let mut h = Harness::start();
    let mut side = h.online().await;

    let err = h.dock.send_ir_code("not-a-code").await.unwrap_err();
    assert!(matches!(
        err,
        DockError::Protocol(yiodock_protocol::ProtocolError::InvalidIrCode(_))
    ));

    // The next thing the dock sees is a regular command, not the bad code.
    h.dock.set_ir_receiver(true).await.unwrap();
    side.expect_frame(json!({"type": "dock", "command": "ir_receive_on"}))
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_commands_are_refused_before_authentication() {
    let mut h = Harness::start();
    let _side = h.accepted().await;

    let err = h.dock.set_ir_receiver(true).await.unwrap_err();
    assert!(matches!(
        err,
        DockError::Session(yiodock_session::SessionError::NotAuthenticated(_))
    ));
}

// =========================================================================
// Inbound events
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ir_receive_is_published() {
    let mut h = Harness::start();
    let mut events = h.dock.subscribe();
    let side = h.online().await;

    side.say(json!({"command": "ir_receive", "code": "1;0x1A2B;3;0"}));
    let code = IrCode::parse("1;0x1A2B;3;0").unwrap();
    loop {
        let event = time::timeout(Duration::from_secs(600), events.recv())
            .await
            .expect("event should arrive")
            .expect("channel should be open");
        if event == DockEvent::IrReceived(code.clone()) {
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_frames_change_nothing() {
    let mut h = Harness::start();
    let mut side = h.online().await;
    let mut events = h.dock.subscribe();

    side.say_raw("not json at all");
    side.say(json!({"type": "weather", "message": "sunny"}));
    side.say(json!({"type": "dock", "message": "reboot"}));
    side.say(pong());

    // The pong is handled after every frame before it.
    let before = Instant::now();
    side.expect_frame(ping()).await;
    assert_eq!(before.elapsed(), Duration::from_secs(120));

    let seen = drain(&mut events);
    assert_eq!(
        seen[..2],
        [
            DockEvent::StatusText(Some("Heart beat received".into())),
            DockEvent::ValueChanged,
        ],
        "only the pong should produce events, got {seen:?}"
    );
    assert!(!seen.iter().any(|e| matches!(e, DockEvent::Status(_))));
    assert_eq!(h.dock.state(), ConnectionState::CheckPong);
    assert_eq!(*h.dock.status().borrow(), DockStatus::Online);
    assert!(h.attempts.try_recv().is_err());
}

// =========================================================================
// Heartbeat and recovery
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_answered_heartbeats_keep_the_link() {
    let mut h = Harness::start();
    let mut side = h.online().await;

    for _ in 0..3 {
        side.say(pong());
        // Probe, check, probe: the next ping is two periods later.
        let before = Instant::now();
        side.expect_frame(ping()).await;
        assert_eq!(before.elapsed(), Duration::from_secs(120));
    }
    assert!(h.dock.state().is_authenticated());
    assert_eq!(*h.dock.status().borrow(), DockStatus::Online);
}

#[tokio::test(start_paused = true)]
async fn test_missed_pong_triggers_reconnect() {
    let mut h = Harness::start();
    let mut events = h.dock.subscribe();
    let mut side = h.online().await;

    // Stay silent: the check tick one period later declares the link dead
    // and the first reconnect tick fires at once.
    side.expect_closed().await;
    let attempt = h.next_attempt().await;
    assert_eq!(h.elapsed(&attempt), Duration::from_secs(60));

    let seen = drain(&mut events);
    assert!(seen
        .iter()
        .any(|e| matches!(e, DockEvent::Status(s) if is_comm_error(s))));
    assert!(seen.contains(&DockEvent::StatusText(None)));

    let mut side = attempt.dock.expect("redial should be accepted");
    side.handshake().await;
    wait_for_status(&mut h.dock.status(), DockStatus::is_online).await;
}

#[tokio::test(start_paused = true)]
async fn test_dock_hangup_triggers_reconnect() {
    let mut h = Harness::start();
    let side = h.online().await;

    drop(side);
    let mut side = h.accepted().await;
    assert!(is_comm_error(&h.dock.status().borrow()));

    side.handshake().await;
    wait_for_status(&mut h.dock.status(), DockStatus::is_online).await;
}

#[tokio::test(start_paused = true)]
async fn test_refused_dials_retry_every_reconnect_period() {
    let mut h = Harness::start_refusing(true);

    // The initial failure starts recovery, whose first tick is immediate.
    for expected in [0, 0, 30, 60] {
        let attempt = h.next_attempt().await;
        assert!(attempt.dock.is_none());
        assert_eq!(h.elapsed(&attempt), Duration::from_secs(expected));
    }
    assert!(is_comm_error(&h.dock.status().borrow()));
    assert!(!h.dock.state().is_authenticated());

    h.refuse.store(false, Ordering::SeqCst);
    let attempt = h.next_attempt().await;
    assert_eq!(h.elapsed(&attempt), Duration::from_secs(90));
    let mut side = attempt.dock.expect("dial should be accepted");
    side.handshake().await;
    wait_for_status(&mut h.dock.status(), DockStatus::is_online).await;

    // Recovery is over: no more dials while the dock answers heartbeats.
    side.say(pong());
    side.expect_frame(ping()).await;
    assert!(h.attempts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_silent_dock_is_redialed_after_a_period() {
    let mut h = Harness::start_refusing(true);
    let _ = h.next_attempt().await;
    let _ = h.next_attempt().await;
    h.refuse.store(false, Ordering::SeqCst);

    // Accepts the connection but never says anything.
    let mut mute = h.accepted().await;
    let attempt = h.next_attempt().await;
    assert_eq!(h.elapsed(&attempt), Duration::from_secs(60));
    mute.expect_closed().await;
}

#[tokio::test(start_paused = true)]
async fn test_silent_dock_on_first_attempt_is_left_waiting() {
    let mut h = Harness::start();
    let _mute = h.accepted().await;

    time::sleep(Duration::from_secs(600)).await;
    assert_eq!(h.dock.state(), ConnectionState::ConnectionEstablished);
    assert_eq!(*h.dock.status().borrow(), DockStatus::Unknown);
    assert!(h.attempts.try_recv().is_err(), "no timer runs before recovery");
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_dispose_closes_link_and_is_idempotent() {
    let mut h = Harness::start();
    let mut side = h.online().await;
    let mut events = h.dock.subscribe();

    h.dock.dispose().await;
    side.expect_closed().await;
    assert!(h.dock.is_stopped());

    // Subscribers learn that the client is gone.
    loop {
        match events.recv().await {
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
            Err(e) => panic!("unexpected {e:?}"),
        }
    }
    assert!(matches!(
        h.dock.subscribe().recv().await,
        Err(broadcast::error::RecvError::Closed)
    ));
    assert!(matches!(
        h.dock.set_ir_receiver(true).await,
        Err(DockError::Stopped)
    ));

    // Safe to repeat once stopped; no timers survive to redial.
    h.dock.dispose().await;
    time::sleep(Duration::from_secs(600)).await;
    assert!(h.attempts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_stops_the_client() {
    let mut h = Harness::start();
    let mut side = h.online().await;
    let clone = h.dock.clone();

    drop(clone);
    drop(h.dock);
    side.expect_closed().await;
}

// =========================================================================
// Real WebSocket dock
// =========================================================================

#[tokio::test]
async fn test_handshake_over_websocket() {
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::text(r#"{"type":"auth_required"}"#.to_owned()))
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let value: Value = serde_json::from_str(&text).unwrap();
            received.push(value.clone());
            if value["type"] == "auth" {
                ws.send(Message::text(r#"{"type":"auth_ok"}"#.to_owned()))
                    .await
                    .unwrap();
            }
            if value["command"] == "ir_send" {
                break;
            }
        }
        received
    });

    let dock = DockClient::spawn(DockConfig {
        port,
        ..DockConfig::new("127.0.0.1", "secret")
    })
    .unwrap();
    wait_for_status(&mut dock.status(), DockStatus::is_online).await;
    dock.send_ir_code("4;0xE0E040BF;32;0").await.unwrap();

    let received = time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should finish")
        .unwrap();
    assert_eq!(received[0], json!({"type": "auth", "token": "secret"}));
    assert!(received.contains(&ping()));
    assert_eq!(
        received.last(),
        Some(&json!({
            "type": "dock",
            "command": "ir_send",
            "code": "4;0xE0E040BF;32;0",
            "format": "hex"
        }))
    );

    dock.dispose().await;
}

#[tokio::test]
async fn test_malformed_binary_frame_keeps_dock_online() {
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::text(r#"{"type":"auth_required"}"#.to_owned()))
            .await
            .unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else { continue };
            let value: Value = serde_json::from_str(&text).unwrap();
            if value["type"] == "auth" {
                ws.send(Message::text(r#"{"type":"auth_ok"}"#.to_owned()))
                    .await
                    .unwrap();
                ws.send(Message::Binary(vec![0xff, 0xfe, 0x00].into()))
                    .await
                    .unwrap();
                ws.send(Message::text(pong().to_string())).await.unwrap();
            }
            if value["command"] == "ir_send" {
                break;
            }
        }
    });

    let dock = DockClient::spawn(DockConfig {
        port,
        ..DockConfig::new("127.0.0.1", "0")
    })
    .unwrap();
    let mut events = dock.subscribe();

    // The pong follows the bad frame on the same link.
    let heartbeat = DockEvent::StatusText(Some("Heart beat received".into()));
    time::timeout(Duration::from_secs(5), async {
        while events.recv().await.expect("client should run") != heartbeat {}
    })
    .await
    .expect("pong should arrive after the bad frame");

    assert_eq!(*dock.status().borrow(), DockStatus::Online);
    assert!(dock.state().is_authenticated());

    dock.send_ir_code("4;0xE0E040BF;32;0").await.unwrap();
    time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should finish")
        .unwrap();
    dock.dispose().await;
}
