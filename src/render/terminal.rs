//! ASCII heatmap for terminals
//!
//! Highest price first. Each side's cell is shaded by its quantity relative to
//! the largest quantity in the frame.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt::Write;

use super::{RenderFrame, RenderOutcome, WaitReason};

const SHADES: &[u8] = b" .:-=+*#%@";
const CELL_WIDTH: usize = 8;

/// Shade character for `quantity` on a scale topped by `max`
pub fn shade(quantity: Decimal, max: Decimal) -> char {
    if max <= Decimal::ZERO || quantity <= Decimal::ZERO {
        return SHADES[0] as char;
    }
    let top = SHADES.len() - 1;
    let scaled = (quantity / max * Decimal::from(top)).round();
    // Anything present gets at least the faintest mark
    let index = scaled.to_usize().unwrap_or(top).clamp(1, top);
    SHADES[index] as char
}

/// Render an outcome as text, ending with a newline
pub fn draw(outcome: &RenderOutcome) -> String {
    match outcome {
        RenderOutcome::Frame(frame) => draw_frame(frame),
        RenderOutcome::Waiting {
            symbol,
            taken_at,
            reason,
        } => {
            let what = match reason {
                WaitReason::Uninitialized => "waiting for order book snapshot",
                WaitReason::EmptyBook => "waiting for bids and asks",
            };
            format!("{} order book | {} | {}\n", symbol, what, taken_at.format("%H:%M:%S"))
        }
    }
}

fn cell(shade: char) -> String {
    std::iter::repeat(shade).take(CELL_WIDTH).collect()
}

fn draw_frame(frame: &RenderFrame) -> String {
    let max = frame.view.max_quantity();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} order book | mid {} | updated {}",
        frame.symbol,
        frame.mid_price.round_dp(2),
        frame.taken_at.format("%H:%M:%S")
    );
    let _ = writeln!(
        out,
        "{:>14} |{:^w$}|{:^w$}|",
        "price",
        "bid",
        "ask",
        w = CELL_WIDTH
    );

    for band in frame.view.bands.iter().rev() {
        let bid = cell(shade(band.bid_quantity, max));
        let ask = cell(shade(band.ask_quantity, max));
        let _ = writeln!(out, "{:>14} |{}|{}|", band.price, bid, ask);
    }

    out
}
