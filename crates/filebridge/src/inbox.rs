//! Executor side of the exchange.
//!
//! Reads pending command artifacts and writes response artifacts. Performs
//! no actions itself; whoever drives the inbox decides what a command means.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;

use crate::bridge::codec;
use crate::bridge::protocol::{
    ARTIFACT_EXTENSION, Command, CommandId, command_artifact, response_artifact,
};
use crate::bridge::store::write_atomically;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone)]
pub struct CommandInbox {
    commands_dir: PathBuf,
    responses_dir: PathBuf,
}

impl CommandInbox {
    pub fn new(commands_dir: impl Into<PathBuf>, responses_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands_dir: commands_dir.into(),
            responses_dir: responses_dir.into(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(&config.commands_dir, &config.responses_dir)
    }

    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    pub fn responses_dir(&self) -> &Path {
        &self.responses_dir
    }

    /// All decodable commands waiting in the commands directory, oldest first.
    ///
    /// A missing directory means nothing is pending. Artifacts that cannot be
    /// read or decoded are logged and skipped.
    pub fn pending(&self) -> Result<Vec<Command>> {
        let entries = match fs::read_dir(&self.commands_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(BridgeError::ReadFailed {
                    path: self.commands_dir.clone(),
                    source,
                });
            }
        };

        let mut found: Vec<(SystemTime, PathBuf, Command)> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }

            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable command");
                    continue;
                }
            };
            match codec::decode_command(&bytes) {
                Ok(command) => {
                    let modified = entry
                        .metadata()
                        .and_then(|m| m.modified())
                        .unwrap_or(SystemTime::UNIX_EPOCH);
                    found.push((modified, path, command));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping undecodable command");
                }
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(found.into_iter().map(|(_, _, command)| command).collect())
    }

    /// Remove a processed command. Removing a missing command succeeds.
    pub fn consume(&self, id: CommandId) -> Result<()> {
        let path = self.commands_dir.join(command_artifact(id));
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BridgeError::WriteFailed { path, source }),
        }
    }

    /// Write the response for `id`. The caller sees it complete or not at all.
    pub fn reply(&self, id: CommandId, body: &Value) -> Result<PathBuf> {
        let payload = serde_json::to_vec_pretty(body)?;
        let name = response_artifact(id);
        let path = write_atomically(&self.responses_dir, &name, &payload).map_err(|source| {
            BridgeError::WriteFailed {
                path: self.responses_dir.join(&name),
                source,
            }
        })?;
        tracing::debug!(command_id = %id, path = %path.display(), "Wrote response");
        Ok(path)
    }
}
