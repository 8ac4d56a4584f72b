//! Depth feed manager
//!
//! Owns the mutation side of the replica: connect, seed from a REST snapshot,
//! apply streamed depth updates, and on any failure discard the book and start
//! over with a fresh snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};

use super::WebSocketClient;
use crate::config::Config;
use crate::error::{BookError, Result};
use crate::orderbook::{ReplicaGuard, SnapshotLoader};
use crate::parser::ParsedMessage;
use crate::rest::SnapshotSource;
use crate::telemetry::FeedCounters;

/// Maximum backoff delay in milliseconds (60 seconds)
const MAX_BACKOFF_MS: u64 = 60_000;
/// Cooldown period after which reconnect attempts are reset (5 minutes)
const RECONNECT_COOLDOWN_SECS: u64 = 300;
/// Idle time before a keepalive ping is sent
const KEEPALIVE_AFTER: Duration = Duration::from_secs(30);
/// Receive timeout that marks the connection as stale
const RECV_TIMEOUT: Duration = Duration::from_secs(45);

/// Exponential backoff: `base * 2^min(attempt, 6)`, capped at one minute
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let delay = base_ms.saturating_mul(2u64.pow(attempt.min(6)));
    Duration::from_millis(delay.min(MAX_BACKOFF_MS))
}

/// Attempt number after a failed connection.
///
/// `since_last_success` is the time since this connection was seeded, if it got
/// that far. A connection that stayed up past the cooldown starts the count over;
/// one that drops right after its snapshot keeps backing off.
pub fn next_attempt(attempts: u32, since_last_success: Option<Duration>) -> u32 {
    match since_last_success {
        Some(elapsed) if elapsed > Duration::from_secs(RECONNECT_COOLDOWN_SECS) => 1,
        _ => attempts.saturating_add(1),
    }
}

/// Keeps the replica in sync with the exchange, reconnecting forever
pub struct FeedManager<S: SnapshotSource> {
    config: Arc<Config>,
    guard: Arc<ReplicaGuard>,
    counters: FeedCounters,
    source: S,
    client: WebSocketClient,
    reconnect_attempts: u32,
    last_successful_connection: Option<Instant>,
}

impl<S: SnapshotSource> FeedManager<S> {
    pub fn new(
        config: Arc<Config>,
        guard: Arc<ReplicaGuard>,
        counters: FeedCounters,
        source: S,
    ) -> Self {
        let client = WebSocketClient::new(&config.ws_endpoint, &config.symbol);

        Self {
            config,
            guard,
            counters,
            source,
            client,
            reconnect_attempts: 0,
            last_successful_connection: None,
        }
    }

    /// Run the feed; only returns if the task is cancelled
    pub async fn run(&mut self) -> Result<()> {
        info!(symbol = %self.config.symbol, url = %self.client.url(), "Starting depth feed");

        loop {
            let delay = self.connection_cycle().await;
            sleep(delay).await;
        }
    }

    /// One connection plus teardown; returns how long to wait before the next one
    async fn connection_cycle(&mut self) -> Duration {
        let outcome = self.connect_and_process().await;

        // Whatever happened, the local book can no longer be trusted
        self.client.close().await;
        self.guard.invalidate().await;
        self.counters.reconnects.inc();

        let since_last_success = self.last_successful_connection.take().map(|t| t.elapsed());

        match outcome {
            Ok(()) => {
                info!("Depth feed finished, reconnecting");
                Duration::from_secs(1)
            }
            Err(e) => {
                error!(error = %e, "Depth feed error");
                let attempt = next_attempt(self.reconnect_attempts, since_last_success);
                if attempt <= self.reconnect_attempts {
                    info!(
                        previous_attempts = self.reconnect_attempts,
                        "Resetting reconnect counter after cooldown period"
                    );
                }
                self.reconnect_attempts = attempt;

                let delay = backoff_delay(self.config.reconnect_delay_ms, self.reconnect_attempts);
                warn!(
                    attempt = self.reconnect_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting after error"
                );
                delay
            }
        }
    }

    /// One connection lifetime: connect, seed, then apply updates until failure
    async fn connect_and_process(&mut self) -> Result<()> {
        self.client.connect().await?;

        // Updates sent while the snapshot is in flight wait in the socket buffer
        self.resync().await?;

        self.last_successful_connection = Some(Instant::now());

        let mut last_message = Instant::now();

        loop {
            match timeout(RECV_TIMEOUT, self.client.recv()).await {
                Ok(Ok(Some(text))) => {
                    last_message = Instant::now();
                    if let Err(e) = self.process_message(&text).await {
                        warn!(error = %e, "Dropping depth message");
                    }
                }
                Ok(Ok(None)) => {
                    if last_message.elapsed() > KEEPALIVE_AFTER {
                        if let Err(e) = self.client.ping().await {
                            warn!(error = %e, "Failed to send keepalive ping");
                        }
                    }
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!(
                        last_message_secs = last_message.elapsed().as_secs(),
                        "No message received within timeout, sending keepalive"
                    );
                    if let Err(e) = self.client.ping().await {
                        warn!(error = %e, "Failed to send keepalive ping, reconnecting");
                        return Err(BookError::ConnectionTimeout);
                    }
                }
            }
        }
    }

    /// Discard the replica and seed it from a fresh REST snapshot.
    ///
    /// On failure the replica stays uninitialized.
    pub async fn resync(&self) -> Result<()> {
        self.guard.invalidate().await;

        let fetched = self
            .source
            .fetch(&self.config.symbol, self.config.snapshot_depth)
            .await;
        // Parsing happens before the lock is taken; install is a single swap
        let loaded = fetched.and_then(|snapshot| {
            SnapshotLoader::from_snapshot(&snapshot).map(|book| (snapshot.last_update_id, book))
        });

        match loaded {
            Ok((last_update_id, book)) => {
                let (bid_levels, ask_levels) = (book.bid_levels(), book.ask_levels());
                self.guard.install_snapshot(book).await;
                self.counters.snapshots_installed.inc();
                info!(
                    symbol = %self.config.symbol,
                    last_update_id = ?last_update_id,
                    bid_levels,
                    ask_levels,
                    "Order book initialized"
                );
                Ok(())
            }
            Err(e) => {
                self.counters.snapshot_failures.inc();
                Err(e)
            }
        }
    }

    /// Parse one stream message and apply it if it is a depth update.
    ///
    /// Returns whether a batch was applied.
    pub async fn process_message(&self, raw: &str) -> Result<bool> {
        let parsed = match ParsedMessage::parse(raw) {
            Ok(parsed) => parsed,
            Err(e @ BookError::MalformedDelta(_)) => {
                self.counters.malformed_deltas.inc();
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        match parsed {
            ParsedMessage::DepthUpdate(update) => {
                let final_update_id = update.final_update_id;
                let batch = update.into_batch();

                if self.guard.apply_delta(&batch).await {
                    self.counters.batches_applied.inc();
                    trace!(
                        changes = batch.len(),
                        final_update_id = ?final_update_id,
                        "Depth update applied"
                    );
                    Ok(true)
                } else {
                    self.counters.batches_dropped.inc();
                    debug!(
                        final_update_id = ?final_update_id,
                        "Depth update before snapshot, dropped"
                    );
                    Ok(false)
                }
            }
            ParsedMessage::Unknown(msg) => {
                trace!(msg = %msg, "Ignoring non-depth message");
                Ok(false)
            }
        }
    }
}
