//! Partition storage.
//!
//! This module defines the `CacheStore` capability the engine works against
//! and two implementations:
//!
//! - `MemoryStore`: process-local, used by tests and ephemeral runs
//! - `CacheDb`: SQLite via tokio-rusqlite, WAL mode, versioned migrations,
//!   entries addressed by a SHA-256 of the request key

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryStore;
pub use store::CacheStore;
