//! Price band aggregation
//!
//! Buckets every level into `floor(price / step) * step` and sums quantities per
//! side. The output is dense: every bucket in the window is present, empty or not.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderBookReplica, Side};
use crate::error::{BookError, Result};

/// Upper bound on buckets per view
pub const MAX_BUCKETS: usize = 100_000;

/// One price bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    /// Inclusive lower bound of the bucket, a multiple of the step
    pub price: Decimal,
    pub bid_quantity: Decimal,
    pub ask_quantity: Decimal,
}

/// Dense bucketed view, ascending by price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandedView {
    pub step: Decimal,
    pub bands: Vec<Band>,
}

impl BandedView {
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Largest single-side quantity across all bands
    pub fn max_quantity(&self) -> Decimal {
        self.bands
            .iter()
            .map(|b| b.bid_quantity.max(b.ask_quantity))
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    /// Band whose lower bound is exactly `price`
    pub fn band_at(&self, price: Decimal) -> Option<&Band> {
        self.bands.iter().find(|b| b.price == price)
    }
}

fn overflow(what: &str, value: Decimal, step: Decimal) -> BookError {
    BookError::InvalidBand(format!("{} {} cannot be bucketed with step {}", what, value, step))
}

fn check_step(step: Decimal) -> Result<()> {
    if step <= Decimal::ZERO {
        return Err(BookError::InvalidBand(format!("step must be positive, got {}", step)));
    }
    Ok(())
}

/// Bucket lower bound for a price
fn bucket_of(price: Decimal, step: Decimal) -> Result<Decimal> {
    price
        .checked_div(step)
        .and_then(|q| q.floor().checked_mul(step))
        .ok_or_else(|| overflow("price", price, step))
}

/// Number of buckets a window of `width` spans, at most `MAX_BUCKETS`
pub fn bucket_count(width: Decimal, step: Decimal) -> Result<usize> {
    check_step(step)?;
    width
        .checked_div(step)
        .and_then(|n| n.floor().to_usize())
        .and_then(|n| n.checked_add(1))
        .filter(|n| *n <= MAX_BUCKETS)
        .ok_or_else(|| {
            BookError::InvalidBand(format!(
                "window of width {} with step {} exceeds {} buckets",
                width, step, MAX_BUCKETS
            ))
        })
}

/// Aggregate the replica into step-wide buckets covering `[lower, upper]`.
///
/// Buckets are the multiples of `step` inside the window, so the first bucket is
/// `lower` rounded up to the step grid.
pub fn aggregate(
    book: &OrderBookReplica,
    lower: Decimal,
    upper: Decimal,
    step: Decimal,
) -> Result<BandedView> {
    check_step(step)?;
    if lower > upper {
        return Err(BookError::InvalidBand(format!(
            "lower bound {} is above upper bound {}",
            lower, upper
        )));
    }

    let first = lower
        .checked_div(step)
        .and_then(|q| q.ceil().checked_mul(step))
        .ok_or_else(|| overflow("lower bound", lower, step))?;
    let last = bucket_of(upper, step)?;
    if first > last {
        return Ok(BandedView {
            step,
            bands: Vec::new(),
        });
    }

    let width = last.checked_sub(first).ok_or_else(|| {
        BookError::InvalidBand(format!("window [{}, {}] is too wide", lower, upper))
    })?;
    let count = bucket_count(width, step)?;
    // Exclusive end of the last bucket
    let end = last
        .checked_add(step)
        .ok_or_else(|| overflow("upper bound", upper, step))?;

    let mut bands: Vec<Band> = (0..count)
        .map(|i| Band {
            price: first + step * Decimal::from(i),
            bid_quantity: Decimal::ZERO,
            ask_quantity: Decimal::ZERO,
        })
        .collect();

    for (price, side, quantity) in book.iter() {
        if price < first || price >= end {
            continue;
        }
        let bucket = bucket_of(price, step)?;
        let Some(index) = ((bucket - first) / step).to_usize() else {
            continue;
        };
        if let Some(band) = bands.get_mut(index) {
            match side {
                Side::Bid => band.bid_quantity = band.bid_quantity.saturating_add(quantity),
                Side::Ask => band.ask_quantity = band.ask_quantity.saturating_add(quantity),
            }
        }
    }

    Ok(BandedView { step, bands })
}

/// Mid price of the replica.
///
/// Fails with `EmptyBookTransient` while either side is empty; callers skip the cycle.
pub fn mid_price(book: &OrderBookReplica) -> Result<Decimal> {
    book.mid_price().ok_or(BookError::EmptyBookTransient)
}

/// Step-aligned window of `mid ± range`
pub fn band_bounds(mid: Decimal, range: Decimal, step: Decimal) -> Result<(Decimal, Decimal)> {
    check_step(step)?;
    if range < Decimal::ZERO {
        return Err(BookError::InvalidBand(format!("range must not be negative, got {}", range)));
    }
    let lower = mid
        .checked_sub(range)
        .ok_or_else(|| overflow("mid minus range", mid, step))?;
    let upper = mid
        .checked_add(range)
        .ok_or_else(|| overflow("mid plus range", mid, step))?;
    Ok((bucket_of(lower, step)?, bucket_of(upper, step)?))
}
