//! Feed counters exported on `/metrics`

use prometheus::{IntCounter, Registry};

use crate::error::{BookError, Result};

/// Counters for the mutation side of the replica
#[derive(Debug, Clone)]
pub struct FeedCounters {
    pub batches_applied: IntCounter,
    pub batches_dropped: IntCounter,
    pub malformed_deltas: IntCounter,
    pub snapshots_installed: IntCounter,
    pub snapshot_failures: IntCounter,
    pub reconnects: IntCounter,
}

impl FeedCounters {
    /// Create unregistered counters
    pub fn new() -> Result<Self> {
        Ok(Self {
            batches_applied: counter(
                "depth_batches_applied_total",
                "Depth updates applied to the replica",
            )?,
            batches_dropped: counter(
                "depth_batches_dropped_total",
                "Depth updates dropped because no snapshot was installed",
            )?,
            malformed_deltas: counter(
                "depth_malformed_deltas_total",
                "Depth updates rejected for unparsable fields",
            )?,
            snapshots_installed: counter(
                "depth_snapshots_installed_total",
                "REST snapshots installed",
            )?,
            snapshot_failures: counter(
                "depth_snapshot_failures_total",
                "REST snapshot fetch or parse failures",
            )?,
            reconnects: counter("depth_feed_reconnects_total", "Feed reconnect attempts")?,
        })
    }

    /// Register every counter with `registry`
    pub fn register(&self, registry: &Registry) -> Result<()> {
        for c in [
            &self.batches_applied,
            &self.batches_dropped,
            &self.malformed_deltas,
            &self.snapshots_installed,
            &self.snapshot_failures,
            &self.reconnects,
        ] {
            registry
                .register(Box::new(c.clone()))
                .map_err(|e| BookError::ConfigError(format!("metrics registration: {}", e)))?;
        }
        Ok(())
    }
}

fn counter(name: &str, help: &str) -> Result<IntCounter> {
    IntCounter::new(name, help).map_err(|e| BookError::ConfigError(format!("{}: {}", name, e)))
}
