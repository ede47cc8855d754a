//! Replay metrics: counters exposed through the status surface, updated
//! once per committed transaction and once per DDL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Counters {
    queries: AtomicU64,
    transactions: AtomicU64,
    txn_time_micros: AtomicU64,
}

/// Shared, cheaply-cloneable handle to the replay counters. Reading never
/// blocks the writer task.
#[derive(Clone, Default)]
pub struct ReplayMetrics {
    counters: Arc<Counters>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub transactions: u64,
    pub avg_txn_micros: u64,
}

impl ReplayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_queries(&self, count: u64) {
        self.counters.queries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_transaction(&self, elapsed: Duration) {
        self.counters.transactions.fetch_add(1, Ordering::Relaxed);
        self.counters
            .txn_time_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let transactions = self.counters.transactions.load(Ordering::Relaxed);
        let txn_time = self.counters.txn_time_micros.load(Ordering::Relaxed);
        MetricsSnapshot {
            queries: self.counters.queries.load(Ordering::Relaxed),
            transactions,
            avg_txn_micros: if transactions == 0 { 0 } else { txn_time / transactions },
        }
    }
}

/// Measures the wall-clock span of one transaction's replay for metrics.
pub struct TxnTimer {
    started: Instant,
}

impl TxnTimer {
    pub fn start() -> Self {
        Self { started: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_transaction_time() {
        let metrics = ReplayMetrics::new();
        metrics.record_queries(3);
        metrics.record_transaction(Duration::from_micros(100));
        metrics.record_transaction(Duration::from_micros(300));
        let snap = metrics.snapshot();
        assert_eq!(snap.queries, 3);
        assert_eq!(snap.transactions, 2);
        assert_eq!(snap.avg_txn_micros, 200);
    }
}
