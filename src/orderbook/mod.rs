//! Order book module
//!
//! Maintains a local replica of one symbol's depth: a REST snapshot merged with
//! streamed depth updates, shared between the feed and the renderer.

mod aggregate;
mod delta;
mod guard;
mod metrics;
mod snapshot;
mod table;

pub use aggregate::{aggregate, band_bounds, bucket_count, mid_price, Band, BandedView, MAX_BUCKETS};
pub use delta::{apply_delta, DeltaBatch};
pub use guard::{ReplicaGuard, ReplicaState, ReplicaWriter};
pub use metrics::ReplicaStats;
pub use snapshot::SnapshotLoader;
pub use table::OrderBookReplica;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// A single (price, quantity) level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}
