//! Counters for resolver activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Atomic counters shared by every transport built from the same options.
pub struct Stats {
    pub exchanges: AtomicU64,
    pub failed_attempts: AtomicU64,
    pub id_mismatches: AtomicU64,
    pub tcp_upgrades: AtomicU64,
    pub cache_hits: AtomicU64,
    /// Cumulative round-trip time in microseconds for averaging.
    total_rtt_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            exchanges: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
            id_mismatches: AtomicU64::new(0),
            tcp_upgrades: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            total_rtt_us: AtomicU64::new(0),
        }
    }

    pub fn record_exchange(&self, rtt: Duration) {
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        self.total_rtt_us
            .fetch_add(rtt.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_id_mismatch(&self) {
        self.id_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tcp_upgrade(&self) {
        self.tcp_upgrades.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let exchanges = self.exchanges.swap(0, Ordering::Relaxed);
        let failed_attempts = self.failed_attempts.swap(0, Ordering::Relaxed);
        let id_mismatches = self.id_mismatches.swap(0, Ordering::Relaxed);
        let tcp_upgrades = self.tcp_upgrades.swap(0, Ordering::Relaxed);
        let cache_hits = self.cache_hits.swap(0, Ordering::Relaxed);
        let total_us = self.total_rtt_us.swap(0, Ordering::Relaxed);

        let avg_rtt_ms = if exchanges > 0 {
            (total_us as f64 / exchanges as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            exchanges,
            failed_attempts,
            id_mismatches,
            tcp_upgrades,
            cache_hits,
            avg_rtt_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct StatsSnapshot {
    pub exchanges: u64,
    pub failed_attempts: u64,
    pub id_mismatches: u64,
    pub tcp_upgrades: u64,
    pub cache_hits: u64,
    pub avg_rtt_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_resets_counters() {
        let stats = Stats::new();
        stats.record_exchange(Duration::from_millis(4));
        stats.record_exchange(Duration::from_millis(2));
        stats.record_id_mismatch();
        stats.record_failed_attempt();

        let snapshot = stats.snapshot_and_reset();
        assert_eq!(snapshot.exchanges, 2);
        assert_eq!(snapshot.failed_attempts, 1);
        assert_eq!(snapshot.id_mismatches, 1);
        assert!((snapshot.avg_rtt_ms - 3.0).abs() < 0.001);

        let empty = stats.snapshot_and_reset();
        assert_eq!(empty.exchanges, 0);
        assert_eq!(empty.avg_rtt_ms, 0.0);
    }
}
