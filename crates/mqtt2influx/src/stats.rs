// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters shared by the message loop and the flush task.
#[derive(Debug)]
pub struct BridgeStats {
    /// Messages delivered by the source.
    pub messages_received: AtomicU64,

    /// Messages that matched a rule and were buffered.
    pub records_mapped: AtomicU64,

    /// Messages that matched no rule.
    pub messages_unmatched: AtomicU64,

    /// Records acknowledged by the sink.
    pub records_written: AtomicU64,

    /// Successful batch writes.
    pub batches_written: AtomicU64,

    /// Failed batch writes (records retained).
    pub flush_failures: AtomicU64,

    /// Records discarded because the buffer cap was reached.
    pub records_dropped: AtomicU64,

    /// Creation time.
    pub created: Instant,
}

impl BridgeStats {
    /// Create zeroed stats.
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            records_mapped: AtomicU64::new(0),
            messages_unmatched: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    /// Record an inbound message and whether it matched.
    pub fn record_message(&self, matched: bool) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        if matched {
            self.records_mapped.fetch_add(1, Ordering::Relaxed);
        } else {
            self.messages_unmatched.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a successful batch write.
    pub fn record_written(&self, records: u64) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records, Ordering::Relaxed);
    }

    /// Record a failed batch write.
    pub fn record_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record records discarded by the buffer cap.
    pub fn record_dropped(&self, records: u64) {
        self.records_dropped.fetch_add(records, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            records_mapped: self.records_mapped.load(Ordering::Relaxed),
            messages_unmatched: self.messages_unmatched.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of bridge statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatsSnapshot {
    pub messages_received: u64,
    pub records_mapped: u64,
    pub messages_unmatched: u64,
    pub records_written: u64,
    pub batches_written: u64,
    pub flush_failures: u64,
    pub records_dropped: u64,
    pub uptime_secs: u64,
}

impl BridgeStatsSnapshot {
    /// Calculate messages per second.
    pub fn messages_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.messages_received as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }

    /// Records mapped but not yet acknowledged or dropped.
    pub fn records_pending(&self) -> u64 {
        self.records_mapped
            .saturating_sub(self.records_written)
            .saturating_sub(self.records_dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = BridgeStats::new();

        stats.record_message(true);
        stats.record_message(true);
        stats.record_message(false);
        stats.record_written(1);
        stats.record_failure();
        stats.record_dropped(0);

        let snap = stats.snapshot();
        assert_eq!(snap.messages_received, 3);
        assert_eq!(snap.records_mapped, 2);
        assert_eq!(snap.messages_unmatched, 1);
        assert_eq!(snap.records_written, 1);
        assert_eq!(snap.batches_written, 1);
        assert_eq!(snap.flush_failures, 1);
        assert_eq!(snap.records_pending(), 1);
    }

    #[test]
    fn test_rate_with_zero_uptime() {
        let snap = BridgeStats::new().snapshot();
        assert_eq!(snap.messages_per_second(), 0.0);
    }
}
