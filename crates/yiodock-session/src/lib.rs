//! Connection lifecycle for the YIO dock.
//!
//! This crate is the "brain" of the client. It owns every decision about
//! the link to the dock and none of the I/O:
//!
//! 1. **State machine**: [`Session::handle`] takes one [`Event`] and
//!    returns the [`Effect`]s the caller must carry out.
//! 2. **Heartbeat supervision**: probe, then check, on alternate ticks.
//! 3. **Reconnection supervision**: tear down and redial on every tick
//!    until authentication succeeds again.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client actor (above)  ← feeds events, runs effects, owns timers and links
//!     ↕
//! Session (this crate)  ← decides state, liveness, supervision and status
//!     ↕
//! Protocol (below)      ← provides InboundMessage, Outbound, IrCode
//! ```
//!
//! Because nothing here touches a socket or a clock, every transition can
//! be tested by feeding a sequence of events and inspecting the effects.

mod address;
mod error;
mod event;
mod heartbeat;
mod machine;
mod reconnect;
mod state;

pub use address::resolve_address;
pub use error::SessionError;
pub use event::{Effect, Event, Request};
pub use machine::{Session, SessionConfig};
pub use state::{ConnectionState, DockStatus, OfflineReason, Supervision};
