//! Converts between wire text and the typed messages in
//! [`types`](crate::types).
//!
//! Both directions are plain functions: there is no per-connection codec
//! state, so the same functions serve every connection and every test.
//!
//! Decoding is structural. The inbound text is parsed into a generic
//! `serde_json::Value` and inspected field by field, instead of being
//! deserialized into a fixed struct. That way extra fields the dock adds in
//! newer firmware are simply ignored, and field names and values can be
//! compared case-insensitively.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{InboundMessage, IrCode, Outbound, ProtocolError};

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decodes one inbound text message. Never fails.
///
/// Input that is not a JSON object, or an object that matches none of the
/// known shapes, becomes [`InboundMessage::Unrecognized`] and is logged.
pub fn decode(raw: &str) -> InboundMessage {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, raw, "inbound text is not valid JSON");
            return InboundMessage::Unrecognized;
        }
    };

    let Some(object) = value.as_object() else {
        tracing::debug!(raw, "inbound JSON is not an object");
        return InboundMessage::Unrecognized;
    };

    let message = classify(object);
    if !message.is_recognized() {
        tracing::warn!(raw, "no known message");
    }
    message
}

/// Applies the decoding rules in priority order.
fn classify(object: &Map<String, Value>) -> InboundMessage {
    if field_is(object, "type", "auth_required") {
        return InboundMessage::AuthRequired;
    }
    if field_is(object, "type", "auth_ok") {
        return InboundMessage::AuthOk;
    }
    if field_is(object, "type", "dock") && field(object, "message").is_some() {
        if field_is(object, "message", "pong") {
            return InboundMessage::Pong;
        }
        if field_is(object, "message", "ir_send") {
            let success =
                field(object, "success").and_then(Value::as_bool) == Some(true);
            return InboundMessage::IrSendAck { success };
        }
        return InboundMessage::Unrecognized;
    }
    if field_is(object, "command", "ir_receive") {
        let code = field(object, "code")
            .and_then(Value::as_str)
            .and_then(|raw| IrCode::parse(raw).ok());
        if code.is_none() {
            tracing::debug!("ir_receive carried a malformed code");
        }
        return InboundMessage::IrReceive { code };
    }
    InboundMessage::Unrecognized
}

/// Case-insensitive field lookup.
fn field<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// `true` if `name` is a string field equal to `expected`, ignoring case.
fn field_is(object: &Map<String, Value>, name: &str, expected: &str) -> bool {
    field(object, name)
        .and_then(Value::as_str)
        .is_some_and(|value| value.eq_ignore_ascii_case(expected))
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// `{"type":"auth","token":...}`
#[derive(Serialize)]
struct AuthRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    token: &'a str,
}

/// `{"type":"dock","command":...}` plus the optional IR payload.
#[derive(Serialize)]
struct DockRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

impl DockRequest<'_> {
    fn command(command: &'static str) -> Self {
        Self {
            kind: "dock",
            command,
            code: None,
            format: None,
        }
    }
}

/// Serializes an outbound request to wire text.
///
/// # Errors
/// Returns [`ProtocolError::Encode`] if JSON serialization fails.
pub fn encode(outbound: &Outbound) -> Result<String, ProtocolError> {
    let text = match outbound {
        Outbound::Authenticate { token } => serde_json::to_string(&AuthRequest {
            kind: "auth",
            token: token.expose(),
        }),
        Outbound::Heartbeat => {
            serde_json::to_string(&DockRequest::command("ping"))
        }
        Outbound::SetIrReceiver { on } => {
            let command = if *on { "ir_receive_on" } else { "ir_receive_off" };
            serde_json::to_string(&DockRequest::command(command))
        }
        Outbound::SendIrCode { code } => serde_json::to_string(&DockRequest {
            code: Some(code.as_str()),
            format: Some("hex"),
            ..DockRequest::command("ir_send")
        }),
    };
    text.map_err(ProtocolError::Encode)
}
