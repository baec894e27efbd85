//! Core types and shared functionality for stash.
//!
//! This crate provides:
//! - Request/response model and normalized cache keys
//! - The `CacheStore` capability with in-memory and SQLite backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{CacheDb, CacheStore, MemoryStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use model::{
    CachedResponse, Destination, PartitionRole, Request, RequestKey, RequestMode, Response, ResponseType,
};
