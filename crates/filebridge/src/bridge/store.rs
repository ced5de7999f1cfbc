//! Correlation store: the mailbox the two processes exchange artifacts through.
//!
//! Implementations:
//! - **FsMailbox**: two directories, one artifact per file (the real wire)
//! - **MemoryMailbox**: in-process maps, same keying, no filesystem

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use super::protocol::{CommandId, command_artifact, response_artifact};

/// Suffix of the scratch file a write goes through before being renamed into place.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Key-addressed store for commands (outbound) and responses (inbound).
///
/// All operations are synchronous and cheap enough to call at sub-second
/// intervals. Absence of a response is `Ok(None)`, never an error.
pub trait Mailbox: Send + Sync {
    /// Write the command artifact for `id`.
    fn put_command(&self, id: CommandId, payload: &[u8]) -> io::Result<()>;

    /// Fetch the response artifact for `id` if it exists.
    fn try_get_response(&self, id: CommandId) -> io::Result<Option<Vec<u8>>>;

    /// Remove the response artifact for `id`. Removing a missing artifact succeeds.
    fn delete_response(&self, id: CommandId) -> io::Result<()>;

    /// Where the command artifact for `id` lives, for diagnostics.
    fn command_location(&self, id: CommandId) -> PathBuf {
        PathBuf::from(command_artifact(id))
    }

    /// Where the response artifact for `id` lives, for diagnostics.
    fn response_location(&self, id: CommandId) -> PathBuf {
        PathBuf::from(response_artifact(id))
    }
}

impl<M: Mailbox + ?Sized> Mailbox for Arc<M> {
    fn put_command(&self, id: CommandId, payload: &[u8]) -> io::Result<()> {
        (**self).put_command(id, payload)
    }

    fn try_get_response(&self, id: CommandId) -> io::Result<Option<Vec<u8>>> {
        (**self).try_get_response(id)
    }

    fn delete_response(&self, id: CommandId) -> io::Result<()> {
        (**self).delete_response(id)
    }

    fn command_location(&self, id: CommandId) -> PathBuf {
        (**self).command_location(id)
    }

    fn response_location(&self, id: CommandId) -> PathBuf {
        (**self).response_location(id)
    }
}

/// Write `bytes` to `dir/name` through a temporary sibling and a rename.
///
/// Readers polling `dir` for `name` never observe a partially written file.
/// Creates `dir` and its ancestors if missing.
pub(crate) fn write_atomically(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let path = dir.join(name);
    let tmp = dir.join(format!("{name}{TEMP_SUFFIX}"));

    if let Err(e) = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, &path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    Ok(path)
}

/// Filesystem mailbox over a commands directory and a responses directory.
///
/// Directories are created lazily on the first command written.
#[derive(Debug, Clone)]
pub struct FsMailbox {
    commands_dir: PathBuf,
    responses_dir: PathBuf,
}

impl FsMailbox {
    pub fn new(commands_dir: impl Into<PathBuf>, responses_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands_dir: commands_dir.into(),
            responses_dir: responses_dir.into(),
        }
    }

    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    pub fn responses_dir(&self) -> &Path {
        &self.responses_dir
    }
}

impl Mailbox for FsMailbox {
    fn put_command(&self, id: CommandId, payload: &[u8]) -> io::Result<()> {
        // The executor writes into the responses directory, so it must exist
        // by the time the command is visible.
        fs::create_dir_all(&self.responses_dir)?;
        let path = write_atomically(&self.commands_dir, &command_artifact(id), payload)?;
        tracing::trace!(command_id = %id, path = %path.display(), "Command artifact written");
        Ok(())
    }

    fn try_get_response(&self, id: CommandId) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.response_location(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn delete_response(&self, id: CommandId) -> io::Result<()> {
        match fs::remove_file(self.response_location(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn command_location(&self, id: CommandId) -> PathBuf {
        self.commands_dir.join(command_artifact(id))
    }

    fn response_location(&self, id: CommandId) -> PathBuf {
        self.responses_dir.join(response_artifact(id))
    }
}

/// In-process mailbox keyed the same way as [`FsMailbox`].
///
/// Lets a caller and an executor in the same process exchange commands
/// without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemoryMailbox {
    commands: DashMap<CommandId, Vec<u8>>,
    responses: DashMap<CommandId, Vec<u8>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded command for `id`, if one was put.
    pub fn command(&self, id: CommandId) -> Option<Vec<u8>> {
        self.commands.get(&id).map(|entry| entry.value().clone())
    }

    pub fn command_ids(&self) -> Vec<CommandId> {
        self.commands.iter().map(|entry| *entry.key()).collect()
    }

    /// Executor side: place a response for `id`.
    pub fn respond(&self, id: CommandId, payload: impl Into<Vec<u8>>) {
        self.responses.insert(id, payload.into());
    }

    pub fn has_response(&self, id: CommandId) -> bool {
        self.responses.contains_key(&id)
    }
}

impl Mailbox for MemoryMailbox {
    fn put_command(&self, id: CommandId, payload: &[u8]) -> io::Result<()> {
        self.commands.insert(id, payload.to_vec());
        Ok(())
    }

    fn try_get_response(&self, id: CommandId) -> io::Result<Option<Vec<u8>>> {
        Ok(self.responses.get(&id).map(|entry| entry.value().clone()))
    }

    fn delete_response(&self, id: CommandId) -> io::Result<()> {
        self.responses.remove(&id);
        Ok(())
    }
}
