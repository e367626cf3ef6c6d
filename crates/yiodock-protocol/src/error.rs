//! Error types for the protocol layer.
//!
//! Decoding never fails (unknown input becomes
//! [`InboundMessage::Unrecognized`](crate::InboundMessage::Unrecognized)),
//! so every variant here is about the outbound direction.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound request failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The string is not a canonical IR code
    /// (`<1-2 digits>;0x<hex>;<digits>;<digit>`).
    ///
    /// Raised before anything reaches the wire: a malformed code is
    /// rejected, never transmitted.
    #[error("invalid IR code format: {0:?}")]
    InvalidIrCode(String),
}
