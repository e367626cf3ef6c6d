//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use yiodock_protocol::AccessToken;
use yiodock_session::{resolve_address, SessionConfig};

/// Errors in a [`DockConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No host was configured.
    #[error("dock host is not set")]
    MissingHost,

    /// The host does not form a usable `ws://host:port` address.
    #[error("invalid dock address: {0}")]
    InvalidAddress(String),
}

// ---------------------------------------------------------------------------
// DockConfig
// ---------------------------------------------------------------------------

/// Configuration for one dock client.
///
/// Every field has a default, so a config file only needs to name what it
/// changes. Usually that is just `host` and `access_token`:
///
/// ```json
/// { "host": "192.168.1.20", "access_token": "0" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockConfig {
    /// Hostname or IP address of the dock.
    pub host: String,

    /// Credential presented during the auth handshake. Never logged.
    pub access_token: AccessToken,

    /// WebSocket port the dock listens on.
    pub port: u16,

    /// Heartbeat period while authenticated. A dead link is detected
    /// within two periods.
    pub heartbeat_interval_secs: u64,

    /// Period between reconnect attempts while recovering.
    pub reconnect_interval_secs: u64,

    /// Upper bound on one TCP connect plus WebSocket upgrade.
    pub connect_timeout_secs: u64,
}

impl DockConfig {
    pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 60;
    pub const DEFAULT_RECONNECT_INTERVAL_SECS: u64 = 30;
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Creates a config with default timings for the given dock.
    pub fn new(
        host: impl Into<String>,
        access_token: impl Into<AccessToken>,
    ) -> Self {
        Self {
            host: host.into(),
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    /// Returns a copy with every zero duration raised to one second.
    ///
    /// A zero period would make a timer spin, and a zero connect timeout
    /// would fail every attempt.
    pub fn validated(mut self) -> Self {
        for secs in [
            &mut self.heartbeat_interval_secs,
            &mut self.reconnect_interval_secs,
            &mut self.connect_timeout_secs,
        ] {
            if *secs == 0 {
                *secs = 1;
            }
        }
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Resolves the dock's WebSocket address, e.g. `ws://192.168.1.20:946/`.
    ///
    /// # Errors
    /// - [`ConfigError::MissingHost`] if `host` is blank.
    /// - [`ConfigError::InvalidAddress`] if `host` is not a bare host name.
    pub fn address(&self) -> Result<String, ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        resolve_address(&self.host, self.port)
            .map_err(|e| ConfigError::InvalidAddress(e.to_string()))
    }

    /// The subset of this config the session state machine needs.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            host: self.host.clone(),
            port: self.port,
            access_token: self.access_token.clone(),
        }
    }
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            access_token: AccessToken::default(),
            port: SessionConfig::DEFAULT_PORT,
            heartbeat_interval_secs: Self::DEFAULT_HEARTBEAT_INTERVAL_SECS,
            reconnect_interval_secs: Self::DEFAULT_RECONNECT_INTERVAL_SECS,
            connect_timeout_secs: Self::DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}
