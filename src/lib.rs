//! Depth heatmap library
//!
//! Keeps a local replica of one Binance symbol's order book (REST snapshot plus
//! streamed depth updates) and renders it as a price-band heatmap.

use prometheus::Registry;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod health;
pub mod orderbook;
pub mod parser;
pub mod publisher;
pub mod render;
pub mod rest;
pub mod telemetry;
pub mod websocket;

pub use config::{BandConfig, BandRange, Config};
pub use error::{BookError, Result};
pub use orderbook::{
    aggregate, apply_delta, BandedView, DeltaBatch, OrderBookReplica, ReplicaGuard, ReplicaState,
    Side, SnapshotLoader,
};
pub use parser::{DepthSnapshot, DepthUpdate, ParsedMessage};
pub use publisher::Publisher;
pub use render::{RenderFrame, RenderLoop, RenderOutcome};
pub use rest::{RestSnapshotClient, SnapshotSource};
pub use telemetry::FeedCounters;
pub use websocket::FeedManager;

/// State shared by the health server
pub struct AppState {
    pub guard: Arc<ReplicaGuard>,
    pub config: Arc<Config>,
    pub counters: FeedCounters,
    pub registry: Registry,
}
