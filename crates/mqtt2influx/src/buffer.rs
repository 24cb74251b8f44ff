// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batching buffer for mapped records.
//!
//! Records are appended as messages arrive and handed to the sink as one
//! batch per flush tick. The buffer is swapped out under the lock and the
//! write happens outside it, so a slow sink never blocks `append`.
//!
//! A failed write puts the batch back in front of whatever arrived in the
//! meantime; the same records are retried on the next tick.

use crate::record::Record;
use crate::sink::{RecordSink, SinkError};
use crate::stats::BridgeStats;
use parking_lot::Mutex;
use std::sync::Arc;

/// Result of one flush tick.
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing was buffered.
    Idle,
    /// The batch was written and removed from the buffer.
    Written(usize),
    /// The write failed; the batch is still buffered.
    Retained { records: usize, error: SinkError },
}

impl FlushOutcome {
    /// True if the sink accepted a batch.
    pub fn is_written(&self) -> bool {
        matches!(self, FlushOutcome::Written(_))
    }
}

/// Shared record buffer.
pub struct Batcher {
    records: Mutex<Vec<Record>>,
    flush_lock: tokio::sync::Mutex<()>,
    max_buffered: Option<usize>,
    stats: Arc<BridgeStats>,
}

impl Batcher {
    /// Create an unbounded batcher.
    pub fn new(stats: Arc<BridgeStats>) -> Self {
        Self::with_limit(None, stats)
    }

    /// Create a batcher that keeps at most `max_buffered` records, dropping
    /// the oldest ones beyond that.
    pub fn with_limit(max_buffered: Option<usize>, stats: Arc<BridgeStats>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            flush_lock: tokio::sync::Mutex::new(()),
            max_buffered,
            stats,
        }
    }

    /// Add a record to the buffer.
    pub fn append(&self, record: Record) {
        let mut records = self.records.lock();
        records.push(record);
        self.enforce_limit(&mut records);
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Copy of the buffered records, oldest first.
    pub fn pending(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Hand the whole buffer to `sink`.
    ///
    /// Concurrent calls are serialized.
    pub async fn flush_tick<S>(&self, sink: &S) -> FlushOutcome
    where
        S: RecordSink + ?Sized,
    {
        let _flushing = self.flush_lock.lock().await;

        let batch = std::mem::take(&mut *self.records.lock());
        if batch.is_empty() {
            return FlushOutcome::Idle;
        }

        let count = batch.len();
        tracing::debug!("Writing {} records", count);

        match sink.write_batch(&batch).await {
            Ok(()) => {
                self.stats.record_written(count as u64);
                FlushOutcome::Written(count)
            }
            Err(error) => {
                tracing::warn!(
                    "Batch write of {} records failed, retrying next tick: {}",
                    count,
                    error
                );
                self.stats.record_failure();
                self.restore(batch);
                FlushOutcome::Retained {
                    records: count,
                    error,
                }
            }
        }
    }

    /// Put a failed batch back ahead of records appended during the write.
    fn restore(&self, mut batch: Vec<Record>) {
        let mut records = self.records.lock();
        batch.append(&mut records);
        *records = batch;
        self.enforce_limit(&mut records);
    }

    fn enforce_limit(&self, records: &mut Vec<Record>) {
        let Some(limit) = self.max_buffered else {
            return;
        };
        if records.len() > limit {
            let excess = records.len() - limit;
            records.drain(..excess);
            self.stats.record_dropped(excess as u64);
            tracing::warn!(
                "Buffer limit of {} records reached, dropped {} oldest",
                limit,
                excess
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use crate::sink::MemorySink;
    use chrono::Utc;
    use std::time::Duration;

    fn record(i: usize) -> Record {
        Record::new("m", Utc::now()).with_field("v", FieldValue::Float(i as f64))
    }

    fn values(records: &[Record]) -> Vec<f64> {
        records
            .iter()
            .map(|r| match r.fields.get("v") {
                Some(FieldValue::Float(v)) => *v,
                other => panic!("unexpected field {:?}", other),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_flush_writes_appended_records_in_order() {
        let stats = Arc::new(BridgeStats::new());
        let batcher = Batcher::new(Arc::clone(&stats));
        let sink = MemorySink::new();

        for i in 0..3 {
            batcher.append(record(i));
        }
        assert_eq!(batcher.len(), 3);

        let outcome = batcher.flush_tick(&sink).await;
        assert!(matches!(outcome, FlushOutcome::Written(3)));
        assert!(batcher.is_empty());

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(values(&batches[0]), vec![0.0, 1.0, 2.0]);
        assert_eq!(stats.snapshot().records_written, 3);
    }

    #[tokio::test]
    async fn test_empty_buffer_does_not_call_sink() {
        let batcher = Batcher::new(Arc::new(BridgeStats::new()));
        let sink = MemorySink::new();

        assert!(matches!(batcher.flush_tick(&sink).await, FlushOutcome::Idle));
        assert_eq!(sink.attempts(), 0);
    }

    #[tokio::test]
    async fn test_failed_flush_retains_records() {
        let stats = Arc::new(BridgeStats::new());
        let batcher = Batcher::new(Arc::clone(&stats));
        let sink = MemorySink::new();
        sink.set_failing(true);

        batcher.append(record(1));
        batcher.append(record(2));

        let outcome = batcher.flush_tick(&sink).await;
        assert!(matches!(outcome, FlushOutcome::Retained { records: 2, .. }));
        assert_eq!(values(&batcher.pending()), vec![1.0, 2.0]);

        // retried indefinitely until the sink recovers
        assert!(!batcher.flush_tick(&sink).await.is_written());
        sink.set_failing(false);
        assert!(batcher.flush_tick(&sink).await.is_written());

        assert!(batcher.is_empty());
        assert_eq!(values(&sink.records()), vec![1.0, 2.0]);
        assert_eq!(stats.snapshot().flush_failures, 2);
    }

    #[tokio::test]
    async fn test_append_during_failed_write_keeps_order() {
        let batcher = Arc::new(Batcher::new(Arc::new(BridgeStats::new())));
        let sink = Arc::new(MemorySink::new());
        sink.set_failing(true);
        sink.set_delay(Duration::from_millis(50));

        batcher.append(record(1));

        let flusher = {
            let batcher = Arc::clone(&batcher);
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { batcher.flush_tick(sink.as_ref()).await })
        };

        // wait until the batch has been swapped out
        while !batcher.is_empty() {
            tokio::task::yield_now().await;
        }
        batcher.append(record(2));

        let outcome = flusher.await.expect("flush task");
        assert!(!outcome.is_written());
        assert_eq!(values(&batcher.pending()), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_append_not_blocked_by_slow_write() {
        let batcher = Arc::new(Batcher::new(Arc::new(BridgeStats::new())));
        let sink = Arc::new(MemorySink::new());
        sink.set_delay(Duration::from_millis(200));

        batcher.append(record(1));
        let flusher = {
            let batcher = Arc::clone(&batcher);
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { batcher.flush_tick(sink.as_ref()).await })
        };
        while !batcher.is_empty() {
            tokio::task::yield_now().await;
        }

        for i in 2..5 {
            batcher.append(record(i));
        }
        assert_eq!(batcher.len(), 3);

        assert!(flusher.await.expect("flush task").is_written());
        assert_eq!(values(&sink.records()), vec![1.0]);
        assert_eq!(values(&batcher.pending()), vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_limit_drops_oldest() {
        let stats = Arc::new(BridgeStats::new());
        let batcher = Batcher::with_limit(Some(3), Arc::clone(&stats));

        for i in 0..5 {
            batcher.append(record(i));
        }
        assert_eq!(values(&batcher.pending()), vec![2.0, 3.0, 4.0]);
        assert_eq!(stats.snapshot().records_dropped, 2);

        let sink = MemorySink::new();
        sink.set_failing(true);
        batcher.flush_tick(&sink).await;
        batcher.append(record(5));
        assert_eq!(values(&batcher.pending()), vec![3.0, 4.0, 5.0]);
        assert_eq!(stats.snapshot().records_dropped, 3);
    }

    #[test]
    fn test_concurrent_appends() {
        let batcher = Arc::new(Batcher::new(Arc::new(BridgeStats::new())));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let batcher = Arc::clone(&batcher);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        batcher.append(record(i));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }

        assert_eq!(batcher.len(), 1000);
    }
}
