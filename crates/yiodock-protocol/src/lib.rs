//! Wire protocol for the YIO dock.
//!
//! This crate defines the "language" the client and the dock speak:
//!
//! - **Types** ([`InboundMessage`], [`Outbound`], [`IrCode`], [`AccessToken`]):
//!   the messages that travel on the wire, in typed form.
//! - **Codec** ([`decode`], [`encode`]): how those messages are converted
//!   to/from JSON text.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   validating.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (whole text messages) and
//! the session (connection lifecycle). It holds no state and knows nothing
//! about connections or timers.
//!
//! ```text
//! Transport (text) → Protocol (InboundMessage) → Session (state machine)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{decode, encode};
pub use error::ProtocolError;
pub use types::{AccessToken, InboundMessage, IrCode, Outbound};
