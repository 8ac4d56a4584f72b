//! Price level table
//!
//! Uses BTreeMap for sorted price level management. A level with zero quantity
//! never exists in the table: writing zero removes the level.

use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::Side;

/// Local replica of one symbol's price levels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBookReplica {
    /// Bids sorted by price descending (highest first)
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    /// Asks sorted by price ascending (lowest first)
    asks: BTreeMap<Decimal, Decimal>,
}

impl OrderBookReplica {
    /// Create a new empty replica
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the level at `(price, side)`.
    ///
    /// A zero (or negative) quantity removes the level instead.
    pub fn upsert(&mut self, price: Decimal, side: Side, quantity: Decimal) {
        if quantity <= Decimal::ZERO {
            self.remove(price, side);
            return;
        }

        match side {
            Side::Bid => {
                self.bids.insert(Reverse(price), quantity);
            }
            Side::Ask => {
                self.asks.insert(price, quantity);
            }
        }
    }

    /// Remove the level at `(price, side)`; no-op if absent
    pub fn remove(&mut self, price: Decimal, side: Side) {
        match side {
            Side::Bid => {
                self.bids.remove(&Reverse(price));
            }
            Side::Ask => {
                self.asks.remove(&price);
            }
        }
    }

    pub fn quantity_at(&self, price: Decimal, side: Side) -> Option<Decimal> {
        match side {
            Side::Bid => self.bids.get(&Reverse(price)).copied(),
            Side::Ask => self.asks.get(&price).copied(),
        }
    }

    /// Drop every level on both sides
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first_key_value().map(|(Reverse(p), _)| *p)
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first_key_value().map(|(p, _)| *p)
    }

    /// Get mid price, if both sides are populated
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Best ask minus best bid
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Every level as `(price, side, quantity)`, bids first
    pub fn iter(&self) -> impl Iterator<Item = (Decimal, Side, Decimal)> + '_ {
        let bids = self.bids.iter().map(|(Reverse(p), q)| (*p, Side::Bid, *q));
        let asks = self.asks.iter().map(|(p, q)| (*p, Side::Ask, *q));
        bids.chain(asks)
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Total number of levels across both sides
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Summed bid quantity
    pub fn bid_depth(&self) -> Decimal {
        self.bids.values().copied().sum()
    }

    /// Summed ask quantity
    pub fn ask_depth(&self) -> Decimal {
        self.asks.values().copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_test_book() -> OrderBookReplica {
        let mut book = OrderBookReplica::new();
        book.upsert(dec!(50000), Side::Bid, dec!(1.0));
        book.upsert(dec!(49999), Side::Bid, dec!(2.0));
        book.upsert(dec!(50001), Side::Ask, dec!(1.5));
        book.upsert(dec!(50002), Side::Ask, dec!(2.5));
        book
    }

    #[test]
    fn test_best_bid_ask() {
        let book = create_test_book();
        assert_eq!(book.best_bid(), Some(dec!(50000)));
        assert_eq!(book.best_ask(), Some(dec!(50001)));
        assert_eq!(book.spread(), Some(dec!(1)));
    }

    #[test]
    fn test_mid_price() {
        let book = create_test_book();
        assert_eq!(book.mid_price(), Some(dec!(50000.5)));
    }

    #[test]
    fn test_upsert_replaces_existing_level() {
        let mut book = create_test_book();
        book.upsert(dec!(50000), Side::Bid, dec!(7));
        assert_eq!(book.quantity_at(dec!(50000), Side::Bid), Some(dec!(7)));
        assert_eq!(book.bid_levels(), 2);
    }

    #[test]
    fn test_upsert_zero_removes_level() {
        let mut book = create_test_book();
        book.upsert(dec!(50001), Side::Ask, dec!(0));
        assert_eq!(book.quantity_at(dec!(50001), Side::Ask), None);
        assert_eq!(book.best_ask(), Some(dec!(50002)));
        assert!(book.iter().all(|(_, _, q)| q > Decimal::ZERO));
    }

    #[test]
    fn test_remove_absent_level_is_noop() {
        let mut book = create_test_book();
        let before = book.clone();
        book.remove(dec!(12345), Side::Bid);
        book.remove(dec!(50000), Side::Ask);
        assert_eq!(book, before);
    }

    #[test]
    fn test_sides_are_independent_keys() {
        let mut book = OrderBookReplica::new();
        book.upsert(dec!(100), Side::Bid, dec!(1));
        book.upsert(dec!(100), Side::Ask, dec!(2));
        assert_eq!(book.quantity_at(dec!(100), Side::Bid), Some(dec!(1)));
        assert_eq!(book.quantity_at(dec!(100), Side::Ask), Some(dec!(2)));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_prices_compare_numerically() {
        let mut book = OrderBookReplica::new();
        book.upsert(dec!(100.0), Side::Bid, dec!(1));
        book.upsert(dec!(100.00), Side::Bid, dec!(3));
        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.quantity_at(dec!(100), Side::Bid), Some(dec!(3)));
    }

    #[test]
    fn test_levels_are_best_first() {
        let book = create_test_book();
        let prices = |wanted: Side| -> Vec<Decimal> {
            book.iter()
                .filter(|(_, side, _)| *side == wanted)
                .map(|(price, _, _)| price)
                .collect()
        };
        let bids = prices(Side::Bid);
        let asks = prices(Side::Ask);
        assert_eq!(bids, vec![dec!(50000), dec!(49999)]);
        assert_eq!(asks, vec![dec!(50001), dec!(50002)]);
        assert_eq!(book.bid_depth(), dec!(3.0));
        assert_eq!(book.ask_depth(), dec!(4.0));
    }
}
