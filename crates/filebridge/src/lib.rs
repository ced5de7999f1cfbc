//! filebridge: request/response between two processes over two directories.

mod version;

pub mod actions;
pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod inbox;

pub use actions::{ObjectKind, Position};
pub use bridge::protocol::{Command, CommandId, Params, Response};
pub use bridge::store::{FsMailbox, Mailbox, MemoryMailbox};
pub use client::{BridgeClient, Reply};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use inbox::CommandInbox;
pub use version::FILEBRIDGE_VERSION;
