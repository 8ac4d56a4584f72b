//! Replica guard
//!
//! The only gateway to the replica. Every mutation (snapshot install or one depth
//! update) goes through `mutate` and runs under the write lock as one synchronous
//! unit, so a copy never observes a half-applied batch. No I/O happens while the
//! lock is held.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::{apply_delta, DeltaBatch, OrderBookReplica, ReplicaStats};

/// Lifecycle of the replica
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaState {
    /// No snapshot installed yet (or the feed dropped and the book was discarded)
    #[default]
    Uninitialized,
    /// A snapshot is installed and depth updates are being applied
    Initialized,
}

#[derive(Debug, Default)]
struct Guarded {
    state: ReplicaState,
    book: OrderBookReplica,
    batches_applied: u64,
}

/// Write access to the replica for the duration of one `mutate` call.
///
/// The book is only reachable through these methods, so the lifecycle state and
/// the batch count always follow the book.
#[derive(Debug)]
pub struct ReplicaWriter<'a> {
    inner: &'a mut Guarded,
}

impl ReplicaWriter<'_> {
    pub fn state(&self) -> ReplicaState {
        self.inner.state
    }

    pub fn book(&self) -> &OrderBookReplica {
        &self.inner.book
    }

    /// Replace the whole replica with a freshly loaded snapshot
    pub fn install(&mut self, book: OrderBookReplica) {
        debug!(
            bid_levels = book.bid_levels(),
            ask_levels = book.ask_levels(),
            previous = ?self.inner.state,
            "Installing snapshot"
        );
        self.inner.book = book;
        self.inner.state = ReplicaState::Initialized;
        self.inner.batches_applied = 0;
    }

    /// Apply one depth update; false while no snapshot is installed
    pub fn apply(&mut self, batch: &DeltaBatch) -> bool {
        if self.inner.state == ReplicaState::Uninitialized {
            return false;
        }
        apply_delta(&mut self.inner.book, batch);
        self.inner.batches_applied += 1;
        true
    }

    /// Discard the replica and return to `Uninitialized`
    pub fn invalidate(&mut self) {
        self.inner.book.clear();
        self.inner.state = ReplicaState::Uninitialized;
        self.inner.batches_applied = 0;
    }
}

/// Owns the replica and serializes access to it
#[derive(Debug, Default)]
pub struct ReplicaGuard {
    inner: RwLock<Guarded>,
}

impl ReplicaGuard {
    /// Create a guard around an empty, uninitialized replica
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one mutation with exclusive access to the replica
    pub async fn mutate<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ReplicaWriter<'_>) -> R,
    {
        let mut guard = self.inner.write().await;
        let mut writer = ReplicaWriter { inner: &mut *guard };
        f(&mut writer)
    }

    /// Independent copy of the last committed state.
    ///
    /// Returns an empty replica while uninitialized.
    pub async fn snapshot_copy(&self) -> OrderBookReplica {
        self.inner.read().await.book.clone()
    }

    /// Copy of the replica together with the state it was taken in
    pub async fn snapshot_with_state(&self) -> (ReplicaState, OrderBookReplica) {
        let guard = self.inner.read().await;
        (guard.state, guard.book.clone())
    }

    /// Replace the whole replica with a freshly loaded snapshot
    pub async fn install_snapshot(&self, book: OrderBookReplica) {
        self.mutate(|writer| writer.install(book)).await
    }

    /// Apply one depth update.
    ///
    /// Returns false if no snapshot is installed; the batch is dropped in that case.
    pub async fn apply_delta(&self, batch: &DeltaBatch) -> bool {
        self.mutate(|writer| writer.apply(batch)).await
    }

    /// Discard the replica and return to `Uninitialized`
    pub async fn invalidate(&self) {
        self.mutate(|writer| writer.invalidate()).await
    }

    pub async fn state(&self) -> ReplicaState {
        self.inner.read().await.state
    }

    pub async fn stats(&self) -> ReplicaStats {
        let guard = self.inner.read().await;
        ReplicaStats::collect(guard.state, &guard.book, guard.batches_applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{PriceLevel, Side, SnapshotLoader};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn seeded() -> OrderBookReplica {
        let mut book = OrderBookReplica::new();
        book.upsert(dec!(100), Side::Bid, dec!(1));
        book.upsert(dec!(101), Side::Ask, dec!(1));
        book
    }

    #[tokio::test]
    async fn test_uninitialized_reads_empty() {
        let guard = ReplicaGuard::new();
        assert_eq!(guard.state().await, ReplicaState::Uninitialized);
        assert!(guard.snapshot_copy().await.is_empty());
    }

    #[tokio::test]
    async fn test_delta_before_snapshot_is_dropped() {
        let guard = ReplicaGuard::new();
        let batch = DeltaBatch::new(vec![PriceLevel::new(dec!(100), dec!(1))], vec![]);
        assert!(!guard.apply_delta(&batch).await);
        assert!(guard.snapshot_copy().await.is_empty());
        assert_eq!(guard.stats().await.batches_applied, 0);
    }

    #[tokio::test]
    async fn test_state_machine_transitions() {
        let guard = ReplicaGuard::new();
        guard.install_snapshot(seeded()).await;
        assert_eq!(guard.state().await, ReplicaState::Initialized);

        let batch = DeltaBatch::new(
            vec![PriceLevel::new(dec!(100), dec!(0))],
            vec![PriceLevel::new(dec!(102), dec!(2))],
        );
        assert!(guard.apply_delta(&batch).await);
        assert_eq!(guard.state().await, ReplicaState::Initialized);

        let copy = guard.snapshot_copy().await;
        assert_eq!(copy.quantity_at(dec!(100), Side::Bid), None);
        assert_eq!(copy.quantity_at(dec!(101), Side::Ask), Some(dec!(1)));
        assert_eq!(copy.quantity_at(dec!(102), Side::Ask), Some(dec!(2)));

        let stats = guard.stats().await;
        assert_eq!(stats.batches_applied, 1);
        assert!(!stats.is_healthy());

        guard.invalidate().await;
        assert_eq!(guard.state().await, ReplicaState::Uninitialized);
        assert!(guard.snapshot_copy().await.is_empty());
    }

    #[test]
    fn test_mutate_returns_closure_result() {
        let guard = ReplicaGuard::new();
        let applied = tokio_test::block_on(guard.mutate(|writer| {
            let batch = DeltaBatch::new(vec![PriceLevel::new(dec!(100), dec!(3))], vec![]);
            writer.apply(&batch)
        }));
        assert!(!applied);
        assert!(tokio_test::block_on(guard.snapshot_copy()).is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_loaded_through_mutate_initializes() {
        let guard = ReplicaGuard::new();
        let bids = vec![("100".to_string(), "1".to_string())];
        let asks = vec![("101".to_string(), "1".to_string())];

        guard
            .mutate(|writer| SnapshotLoader::load(&bids, &asks).map(|book| writer.install(book)))
            .await
            .unwrap();

        let (state, book) = guard.snapshot_with_state().await;
        assert_eq!(state, ReplicaState::Initialized);
        assert_eq!(book.len(), 2);

        let batch = DeltaBatch::new(vec![PriceLevel::new(dec!(100), dec!(0))], vec![]);
        assert!(guard.apply_delta(&batch).await);
        assert_eq!(guard.snapshot_copy().await.quantity_at(dec!(100), Side::Bid), None);
        assert_eq!(guard.stats().await.batches_applied, 1);
    }

    #[tokio::test]
    async fn test_failed_load_inside_mutate_keeps_previous_state() {
        let guard = ReplicaGuard::new();
        guard.install_snapshot(seeded()).await;
        let bids = vec![("100".to_string(), "bad".to_string())];

        let result = guard
            .mutate(|writer| SnapshotLoader::load(&bids, &[]).map(|book| writer.install(book)))
            .await;
        assert!(result.is_err());
        assert_eq!(guard.state().await, ReplicaState::Initialized);
        assert_eq!(guard.snapshot_copy().await, seeded());
    }

    #[tokio::test]
    async fn test_copy_is_not_entangled_with_later_mutations() {
        let guard = ReplicaGuard::new();
        guard.install_snapshot(seeded()).await;

        let first = guard.snapshot_copy().await;
        let batch = DeltaBatch::new(vec![PriceLevel::new(dec!(100), dec!(9))], vec![]);
        guard.mutate(|writer| writer.apply(&batch)).await;
        let second = guard.snapshot_copy().await;

        assert_eq!(first.quantity_at(dec!(100), Side::Bid), Some(dec!(1)));
        assert_eq!(second.quantity_at(dec!(100), Side::Bid), Some(dec!(9)));
    }

    #[tokio::test]
    async fn test_snapshot_with_state_is_consistent() {
        let guard = ReplicaGuard::new();
        let (state, book) = guard.snapshot_with_state().await;
        assert_eq!(state, ReplicaState::Uninitialized);
        assert!(book.is_empty());

        guard.install_snapshot(seeded()).await;
        let (state, book) = guard.snapshot_with_state().await;
        assert_eq!(state, ReplicaState::Initialized);
        assert_eq!(book, seeded());
    }

    // Each batch moves a single bid one tick up: remove the old level, insert the new one.
    // A torn read would show zero or two bid levels.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_copies_never_see_partial_batches() {
        let guard = Arc::new(ReplicaGuard::new());
        let mut start = OrderBookReplica::new();
        start.upsert(Decimal::from(1000), Side::Bid, dec!(1));
        guard.install_snapshot(start).await;

        let writer = {
            let guard = guard.clone();
            tokio::spawn(async move {
                for i in 0..2000i64 {
                    let batch = DeltaBatch::new(
                        vec![
                            PriceLevel::new(Decimal::from(1000 + i), Decimal::ZERO),
                            PriceLevel::new(Decimal::from(1001 + i), dec!(1)),
                        ],
                        vec![],
                    );
                    assert!(guard.apply_delta(&batch).await);
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let guard = guard.clone();
            tokio::spawn(async move {
                let mut last_best = Decimal::ZERO;
                for _ in 0..2000 {
                    let copy = guard.snapshot_copy().await;
                    assert_eq!(copy.bid_levels(), 1);
                    let best = copy.best_bid().unwrap();
                    assert!(best >= last_best);
                    last_best = best;
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();

        let final_book = guard.snapshot_copy().await;
        assert_eq!(final_book.best_bid(), Some(Decimal::from(3000)));
        assert_eq!(guard.stats().await.batches_applied, 2000);
    }
}
