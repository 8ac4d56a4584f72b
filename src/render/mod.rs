//! Heatmap rendering
//!
//! A timer-driven pull: every tick copies the replica, buckets it and draws the
//! result, independent of how fast depth updates arrive.

pub mod terminal;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{BandConfig, BandRange, Config};
use crate::error::{BookError, Result};
use crate::orderbook::{
    aggregate, band_bounds, mid_price, BandedView, OrderBookReplica, ReplicaGuard, ReplicaState,
};
use crate::publisher::Publisher;

/// Why a render cycle shows a waiting indicator instead of a heatmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitReason {
    /// No snapshot installed yet
    Uninitialized,
    /// Bids or asks are empty, so there is no mid price
    EmptyBook,
}

/// Everything the display needs for one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub symbol: String,
    pub taken_at: DateTime<Utc>,
    pub mid_price: Decimal,
    pub view: BandedView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Frame(RenderFrame),
    Waiting {
        symbol: String,
        taken_at: DateTime<Utc>,
        reason: WaitReason,
    },
}

/// Turn one replica copy into a frame, or a waiting indicator.
///
/// Only parameter problems are errors; an empty book is a skipped cycle.
pub fn prepare_frame(
    state: ReplicaState,
    book: &OrderBookReplica,
    symbol: &str,
    band: &BandConfig,
    taken_at: DateTime<Utc>,
) -> Result<RenderOutcome> {
    let waiting = |reason| RenderOutcome::Waiting {
        symbol: symbol.to_string(),
        taken_at,
        reason,
    };

    if state == ReplicaState::Uninitialized {
        return Ok(waiting(WaitReason::Uninitialized));
    }

    let mid = match mid_price(book) {
        Ok(mid) => mid,
        Err(BookError::EmptyBookTransient) => return Ok(waiting(WaitReason::EmptyBook)),
        Err(e) => return Err(e),
    };

    let (lower, upper) = match &band.range {
        BandRange::Fixed { lower, upper } => (*lower, *upper),
        BandRange::AroundMid { range } => band_bounds(mid, *range, band.step)?,
    };

    let view = aggregate(book, lower, upper, band.step)?;

    Ok(RenderOutcome::Frame(RenderFrame {
        symbol: symbol.to_string(),
        taken_at,
        mid_price: mid,
        view,
    }))
}

/// Periodic reader of the replica
pub struct RenderLoop {
    config: Arc<Config>,
    guard: Arc<ReplicaGuard>,
    publisher: Option<Arc<Publisher>>,
}

impl RenderLoop {
    pub fn new(
        config: Arc<Config>,
        guard: Arc<ReplicaGuard>,
        publisher: Option<Arc<Publisher>>,
    ) -> Self {
        Self {
            config,
            guard,
            publisher,
        }
    }

    /// Render forever on the configured interval
    pub async fn run(&self) -> Result<()> {
        let period = self.config.render_interval();
        info!(interval_ms = period.as_millis() as u64, "Starting render loop");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.render_once().await {
                Ok(outcome) => {
                    if let Err(e) = draw_to_stdout(&outcome) {
                        warn!(error = %e, "Failed to draw heatmap");
                    }
                }
                Err(e) => warn!(error = %e, "Render cycle failed"),
            }
        }
    }

    /// One render cycle: copy, aggregate, publish
    pub async fn render_once(&self) -> Result<RenderOutcome> {
        let (state, book) = self.guard.snapshot_with_state().await;
        let outcome = prepare_frame(
            state,
            &book,
            &self.config.symbol,
            &self.config.band,
            Utc::now(),
        )?;

        match &outcome {
            RenderOutcome::Frame(frame) => {
                debug!(
                    mid_price = %frame.mid_price,
                    bands = frame.view.len(),
                    levels = book.len(),
                    "Frame prepared"
                );
                if let Some(publisher) = &self.publisher {
                    publisher.publish(frame).await?;
                }
            }
            RenderOutcome::Waiting { reason, .. } => {
                debug!(reason = ?reason, "Nothing to render yet");
            }
        }

        Ok(outcome)
    }
}

fn draw_to_stdout(outcome: &RenderOutcome) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(terminal::draw(outcome).as_bytes())?;
    stdout.flush()
}
