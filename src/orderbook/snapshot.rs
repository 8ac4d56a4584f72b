//! Snapshot loading
//!
//! Turns the string pairs of a REST depth response into a fresh replica.
//! Population is all-or-nothing: one bad row rejects the whole response.

use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use super::{OrderBookReplica, Side};
use crate::error::{BookError, Result};
use crate::parser::DepthSnapshot;

/// Builds replicas from REST depth snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotLoader;

impl SnapshotLoader {
    /// Parse raw `(price, quantity)` string pairs into a new replica.
    ///
    /// Zero-quantity rows are skipped; a repeated price on one side keeps the later row.
    pub fn load(
        raw_bids: &[(String, String)],
        raw_asks: &[(String, String)],
    ) -> Result<OrderBookReplica> {
        let mut book = OrderBookReplica::new();
        let mut skipped = 0usize;

        for (side, rows) in [(Side::Bid, raw_bids), (Side::Ask, raw_asks)] {
            for (price, quantity) in rows {
                let price = parse_field(price, "price", side)?;
                let quantity = parse_field(quantity, "quantity", side)?;

                if quantity.is_zero() {
                    skipped += 1;
                    continue;
                }
                book.upsert(price, side, quantity);
            }
        }

        debug!(
            bid_levels = book.bid_levels(),
            ask_levels = book.ask_levels(),
            skipped_zero = skipped,
            "Snapshot parsed"
        );

        Ok(book)
    }

    /// Load a decoded REST depth response
    pub fn from_snapshot(snapshot: &DepthSnapshot) -> Result<OrderBookReplica> {
        Self::load(&snapshot.bids, &snapshot.asks)
    }
}

fn parse_field(raw: &str, field: &str, side: Side) -> Result<Decimal> {
    let value = Decimal::from_str(raw.trim()).map_err(|e| {
        BookError::SnapshotUnavailable(format!("{:?} {} {:?}: {}", side, field, raw, e))
    })?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(BookError::SnapshotUnavailable(format!(
            "{:?} {} is negative: {}",
            side, field, raw
        )));
    }

    Ok(value)
}
