//! What goes into the state machine ([`Event`], [`Request`]) and what comes
//! out of it ([`Effect`]).

use yiodock_protocol::{InboundMessage, IrCode, Outbound};

use crate::{DockStatus, Supervision};

/// Everything that can happen to a session.
///
/// Transport callbacks, decoded messages, and both supervisor timers all
/// arrive as events on one serialized stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The client was started: resolve the address and open the first link.
    Start,
    /// The current link's transport connected.
    Connected,
    /// The current link's transport could not connect.
    ConnectFailed(String),
    /// The current link delivered a decoded message.
    Message(InboundMessage),
    /// The current link was closed by the peer.
    Closed,
    /// The current link failed.
    Error(String),
    /// The heartbeat timer fired.
    HeartbeatTick,
    /// The reconnect timer fired.
    ReconnectTick,
}

/// A side effect the owner of the session must carry out, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a new link to `address`, replacing any current one.
    Connect { address: String },
    /// Close the current link, if any.
    CloseLink,
    /// Encode and send a request over the current link.
    Send(Outbound),
    /// Arm exactly the timer for this regime and disarm the other.
    Supervise(Supervision),
    /// The connectivity status changed.
    Status(DockStatus),
    /// New status text (`None` means undefined).
    StatusText(Option<String>),
    /// A message was decoded; observers may want to re-read the status text.
    ValueChanged,
    /// The dock's IR receiver reported a valid code.
    IrReceived(IrCode),
}

/// A device command requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Emit an IR code.
    SendIrCode(IrCode),
    /// Switch the IR receiver on or off.
    SetIrReceiver(bool),
}
