//! Wire types for the command/response exchange.
//!
//! Files are the wire:
//! - **Command**: `<commands-dir>/<id>.json` holding `{ id, action, params }`
//! - **Response**: `<responses-dir>/<id>_response.json`, executor-defined mapping

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Extension shared by command and response artifacts.
pub const ARTIFACT_EXTENSION: &str = "json";

/// Marker appended to the command id to derive the response key.
pub const RESPONSE_SUFFIX: &str = "_response";

/// Parameter mapping carried by a command.
pub type Params = Map<String, Value>;

/// Correlation key for one exchange.
///
/// UUID v4, generated by the caller. Only uniqueness matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(uuid::Uuid);

impl CommandId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let uuid = uuid::Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Artifact name of the command with this id: `<id>.json`.
pub fn command_artifact(id: CommandId) -> String {
    format!("{id}.{ARTIFACT_EXTENSION}")
}

/// Artifact name of the response to the command with this id: `<id>_response.json`.
pub fn response_artifact(id: CommandId) -> String {
    format!("{id}{RESPONSE_SUFFIX}.{ARTIFACT_EXTENSION}")
}

/// A single requested action. Immutable once constructed.
///
/// The id travels both in the artifact name and in the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    id: CommandId,
    action: String,
    #[serde(default)]
    params: Params,
}

impl Command {
    /// Create a command with a freshly generated id.
    pub fn new(action: impl Into<String>, params: Params) -> Self {
        Self::with_id(CommandId::new(), action, params)
    }

    pub fn with_id(id: CommandId, action: impl Into<String>, params: Params) -> Self {
        Self {
            id,
            action: action.into(),
            params,
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// Decoded response body.
///
/// Whatever the executor produced, as long as it is a mapping. Executors
/// conventionally set `status`, `result` and `error`; nothing here
/// interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response(Map<String, Value>);

impl Response {
    pub fn new(body: Map<String, Value>) -> Self {
        Self(body)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Action-specific payload under `result`.
    pub fn result(&self) -> Option<&Value> {
        self.get("result")
    }

    pub fn status(&self) -> Option<&str> {
        self.get("status").and_then(Value::as_str)
    }

    pub fn error(&self) -> Option<&str> {
        self.get("error").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}
