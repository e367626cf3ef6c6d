//! Core protocol types for the dock's wire format.
//!
//! Inbound messages are modelled as a closed enum: the session only cares
//! about a handful of message kinds, and everything else collapses into
//! [`InboundMessage::Unrecognized`]. Outbound requests are the four things
//! the client ever asks the dock to do.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// `<1-2 digits>;0x<hex digits>;<1+ digits>;<1 digit>`, anchored.
static IR_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{1,2};0[xX][0-9a-fA-F]+;[0-9]+;[0-9]$")
        .expect("IR code pattern is a valid regex")
});

// ---------------------------------------------------------------------------
// IrCode
// ---------------------------------------------------------------------------

/// An infrared command in the dock's canonical textual form.
///
/// The four `;`-separated fields are: protocol/device id (1-2 digits),
/// command code in hex (`0x` prefix), repeat count, and toggle bit.
/// For example `"4;0xE0E040BF;32;0"`.
///
/// An `IrCode` can only be built through validation ([`IrCode::parse`],
/// [`FromStr`], [`TryFrom<String>`], or deserialization), so holding one is
/// proof that the code is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IrCode(String);

impl IrCode {
    /// Validates `raw` against the canonical pattern.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidIrCode`] if the string does not match.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        if Self::is_canonical(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(ProtocolError::InvalidIrCode(raw.to_owned()))
        }
    }

    /// Returns `true` if `raw` is a canonical IR code.
    pub fn is_canonical(raw: &str) -> bool {
        IR_CODE_PATTERN.is_match(raw)
    }

    /// The code as it appears on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IrCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IrCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_canonical(&value) {
            Ok(Self(value))
        } else {
            Err(ProtocolError::InvalidIrCode(value))
        }
    }
}

impl From<IrCode> for String {
    fn from(code: IrCode) -> Self {
        code.0
    }
}

// ---------------------------------------------------------------------------
// AccessToken
// ---------------------------------------------------------------------------

/// The opaque credential sent in the authentication request.
///
/// `Debug` is redacted so the token never ends up in logs, even when an
/// [`Outbound::Authenticate`] is traced with `?`.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token. Only the codec should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

impl From<&str> for AccessToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for AccessToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

// ---------------------------------------------------------------------------
// InboundMessage
// ---------------------------------------------------------------------------

/// A message received from the dock, after decoding.
///
/// Produced by [`decode`](crate::decode), consumed once by the session
/// state machine, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// `{"type":"auth_required"}`: the dock greets a fresh connection.
    AuthRequired,

    /// `{"type":"auth_ok"}`: the access token was accepted.
    AuthOk,

    /// `{"type":"dock","message":"pong"}`: heartbeat reply.
    Pong,

    /// `{"type":"dock","message":"ir_send","success":...}`: the dock
    /// tried to emit an IR code. A device-side failure is still a
    /// successful protocol exchange.
    IrSendAck { success: bool },

    /// `{"command":"ir_receive","code":...}`: the dock's IR receiver
    /// picked up a code. `None` when the reported code was malformed.
    IrReceive { code: Option<IrCode> },

    /// Anything else: not JSON, not an object, or an unknown shape.
    Unrecognized,
}

impl InboundMessage {
    /// `false` only for [`InboundMessage::Unrecognized`].
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }

    /// Whether this message proves the dock is alive.
    ///
    /// Liveness is a by-product of any real protocol exchange, not just a
    /// dedicated ping reply.
    pub fn confirms_liveness(&self) -> bool {
        matches!(
            self,
            Self::Pong | Self::IrSendAck { .. } | Self::IrReceive { .. }
        )
    }

    /// Human-readable status for a recognized message.
    ///
    /// For an IR receive event this is the received code itself (empty if
    /// the code was malformed).
    pub fn status_text(&self) -> Option<String> {
        let text = match self {
            Self::AuthRequired => "Authentication required".to_owned(),
            Self::AuthOk => "Authentication ok".to_owned(),
            Self::Pong => "Heart beat received".to_owned(),
            Self::IrSendAck { success: true } => {
                "Send IR Code successfully".to_owned()
            }
            Self::IrSendAck { success: false } => {
                "Send IR Code failure".to_owned()
            }
            Self::IrReceive { code } => code
                .as_ref()
                .map(|c| c.as_str().to_owned())
                .unwrap_or_default(),
            Self::Unrecognized => return None,
        };
        Some(text)
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A request the client sends to the dock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Present the access token.
    Authenticate { token: AccessToken },

    /// Liveness probe; the dock answers with a pong.
    Heartbeat,

    /// Switch the dock's IR receiver on or off.
    SetIrReceiver { on: bool },

    /// Emit an IR code through the dock's blaster.
    SendIrCode { code: IrCode },
}

impl Outbound {
    /// Short name for logging (never includes the token).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::Heartbeat => "heartbeat",
            Self::SetIrReceiver { on: true } => "ir_receive_on",
            Self::SetIrReceiver { on: false } => "ir_receive_off",
            Self::SendIrCode { .. } => "ir_send",
        }
    }
}
