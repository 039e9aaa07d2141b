//! Archive operation counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe archive counters.
#[derive(Debug, Clone, Default)]
pub struct ArchiveMetrics {
    /// Lookups answered from disk
    pub hits: Arc<AtomicU64>,
    /// Lookups with no entry on disk
    pub misses: Arc<AtomicU64>,
    /// Entries whose digest matched but whose key did not
    pub collisions: Arc<AtomicU64>,
    /// Entries written
    pub writes: Arc<AtomicU64>,
}

impl ArchiveMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collision(&self) {
        self.collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ArchiveMetricsSnapshot {
        ArchiveMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ArchiveMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub collisions: u64,
    pub writes: u64,
}

impl ArchiveMetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses + self.collisions;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_hit_rate() {
        let metrics = ArchiveMetrics::default();
        assert_eq!(metrics.snapshot().hit_rate(), 0.0);
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_write();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hits, 3);
        assert_eq!(snapshot.writes, 1);
        assert_eq!(snapshot.hit_rate(), 0.75);
    }
}
