//! Network side of stash.
//!
//! This crate provides the reqwest-backed [`Network`] capability and the
//! caching engine that sits between an application and the network.

pub mod engine;
pub mod fetch;

pub use engine::{
    CacheStrategyEngine, ChannelHost, ClientMessage, ControlChannel, ControlMessage, ControlReply, Engine, Event,
    FetchOutcome, Host, MaintenanceScheduler, NetworkStatus, Outcome, PartitionManager, Phase, RequestClassifier,
    ResponseSource, Strategy,
};
pub use fetch::{FetchClient, FetchConfig, Network};
