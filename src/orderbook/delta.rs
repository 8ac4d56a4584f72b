//! Depth update application
//!
//! A batch is a coalesced diff: zero quantity deletes a level, anything else
//! replaces it, and a repeated key within one batch is superseded by the later entry.

use rust_decimal::Decimal;

use super::{OrderBookReplica, PriceLevel, Side};

/// One depth update's bid and ask changes, in message order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaBatch {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl DeltaBatch {
    pub fn new(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self { bids, asks }
    }

    /// Number of level changes carried by the batch
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Apply a depth update to the replica
pub fn apply_delta(book: &mut OrderBookReplica, batch: &DeltaBatch) {
    for level in &batch.bids {
        update_side(book, Side::Bid, level);
    }

    for level in &batch.asks {
        update_side(book, Side::Ask, level);
    }
}

/// Update a single price level
fn update_side(book: &mut OrderBookReplica, side: Side, level: &PriceLevel) {
    if level.quantity == Decimal::ZERO {
        book.remove(level.price, side);
    } else {
        book.upsert(level.price, side, level.quantity);
    }
}
