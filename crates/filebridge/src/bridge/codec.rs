//! JSON envelope codec for command and response artifacts.
//!
//! Commands are written pretty-printed so they stay human-readable on disk.
//! Parameter order is preserved, so the same command always encodes to the
//! same bytes.

use serde_json::Value;

use super::protocol::{Command, Response};
use crate::error::{BridgeError, Result};

/// Serialize a command to its on-disk form.
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let json = serde_json::to_vec_pretty(command)?;
    tracing::trace!(
        command_id = %command.id(),
        json_size_bytes = json.len(),
        "Encoded command"
    );
    Ok(json)
}

/// Parse a command artifact. Used on the executor side.
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    serde_json::from_slice(bytes).map_err(|e| BridgeError::MalformedPayload(e.to_string()))
}

/// Parse a response artifact. Any JSON object is accepted.
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(Response::new(map)),
        Ok(other) => Err(BridgeError::MalformedPayload(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(BridgeError::MalformedPayload(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
