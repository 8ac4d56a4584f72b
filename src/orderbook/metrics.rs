//! Replica statistics for health reporting

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderBookReplica, ReplicaState};

/// Point-in-time summary of the replica
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaStats {
    pub state: ReplicaState,

    /// Mid price (average of best bid and ask)
    pub mid_price: Option<Decimal>,

    /// Best ask minus best bid
    pub spread: Option<Decimal>,

    /// Total bid depth (volume)
    pub bid_depth: Decimal,

    /// Total ask depth (volume)
    pub ask_depth: Decimal,

    pub bid_levels: usize,
    pub ask_levels: usize,

    /// Depth updates applied since the last snapshot install
    pub batches_applied: u64,
}

impl ReplicaStats {
    pub(crate) fn collect(
        state: ReplicaState,
        book: &OrderBookReplica,
        batches_applied: u64,
    ) -> Self {
        Self {
            state,
            mid_price: book.mid_price(),
            spread: book.spread(),
            bid_depth: book.bid_depth(),
            ask_depth: book.ask_depth(),
            bid_levels: book.bid_levels(),
            ask_levels: book.ask_levels(),
            batches_applied,
        }
    }

    /// Check if the replica is renderable (initialized with both sides present)
    pub fn is_healthy(&self) -> bool {
        self.state == ReplicaState::Initialized && self.bid_levels > 0 && self.ask_levels > 0
    }
}
