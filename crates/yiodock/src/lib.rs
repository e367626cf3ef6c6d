//! # yiodock
//!
//! Self-healing client for the YIO dock, a networked IR hub.
//!
//! The client keeps one WebSocket session to the dock alive: it performs
//! the auth handshake, probes the link with a heartbeat, and reconnects on
//! its own after any failure. Callers get a [`DockHandle`] to send IR codes,
//! toggle the IR receiver, and observe status.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use yiodock::prelude::*;
//!
//! # async fn run() -> Result<(), DockError> {
//! let dock = DockClient::spawn(DockConfig::new("192.168.1.20", "0"))?;
//! let mut events = dock.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let DockEvent::IrReceived(code) = event {
//!         println!("received {code}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! DockHandle ──commands──→ DockActor ──effects──→ link task ──→ Connection
//!                              ↑                       │
//!                              └──── link reports ─────┘
//! ```
//!
//! The decisions live in [`yiodock_session`]; this crate only runs them.

mod client;
mod config;
mod error;
mod event;
mod link;

pub use client::{DockClient, DockHandle};
pub use config::{ConfigError, DockConfig};
pub use error::DockError;
pub use event::DockEvent;

pub use yiodock_protocol::{AccessToken, IrCode};
pub use yiodock_session::{ConnectionState, DockStatus, OfflineReason};
pub use yiodock_transport::{
    Connection, ConnectionId, Connector, TransportError,
};

pub mod prelude {
    pub use crate::{
        ConfigError, ConnectionState, DockClient, DockConfig, DockError,
        DockEvent, DockHandle, DockStatus, IrCode, OfflineReason,
    };
}
