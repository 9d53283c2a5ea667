//! Uplink Storage Library
//!
//! Local-filesystem chunk storage. Upload bytes are appended to one file per
//! upload under a configured base directory.

pub mod vault;

pub use vault::{AppendOutcome, ChunkVault, VaultError};
