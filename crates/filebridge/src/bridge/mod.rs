//! File-based bridge between a caller and an executor process.
//!
//! This module provides the wire types, the envelope codec and the
//! correlation store the two processes exchange artifacts through.
//!
//! # Architecture
//!
//! - **protocol**: Wire types (CommandId, Command, Response) and artifact naming
//! - **codec**: JSON encoding of commands, decoding of responses
//! - **store**: Mailbox trait with filesystem and in-memory implementations

pub mod codec;
pub mod protocol;
pub mod store;
