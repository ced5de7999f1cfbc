//! Version information for filebridge.

/// Filebridge version from Cargo.toml
pub const FILEBRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");
