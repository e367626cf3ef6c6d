//! Observable outputs of a running client.

use yiodock_protocol::IrCode;
use yiodock_session::DockStatus;

/// Something a subscriber may want to know about.
///
/// Delivered through [`DockHandle::subscribe`](crate::DockHandle::subscribe).
/// Slow subscribers may miss events (the channel is a bounded broadcast);
/// [`DockHandle::status`](crate::DockHandle::status) always has the latest
/// status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockEvent {
    /// Connectivity changed.
    Status(DockStatus),
    /// New human-readable status text. `None` clears it.
    StatusText(Option<String>),
    /// A message from the dock was decoded.
    ValueChanged,
    /// The dock's IR receiver picked up a code.
    IrReceived(IrCode),
}
