use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The command artifact could not be written. Never retried.
    #[error("failed to write command artifact {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The response artifact exists but could not be read.
    #[error("failed to read response artifact {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A response artifact was present but is not a JSON object.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPayload(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
