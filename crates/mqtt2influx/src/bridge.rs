// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message loop and flush timer.
//!
//! The bridge runs two activities: the message loop maps every inbound
//! message and appends the record to the batcher, and a timer task hands
//! the buffered records to the sink once per flush interval. When the
//! source ends or shutdown is requested, one final flush is attempted.

use crate::buffer::{Batcher, FlushOutcome};
use crate::config::{BridgeConfig, ConfigError};
use crate::rules::RuleSet;
use crate::sink::{RecordSink, SinkError};
use crate::source::{MessageSource, SourceError};
use crate::stats::BridgeStats;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Bridge errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// MQTT to time-series bridge.
pub struct Bridge<S: RecordSink + 'static> {
    rules: Arc<RuleSet>,
    batcher: Arc<Batcher>,
    sink: Arc<S>,
    flush_interval: Duration,
    stats: Arc<BridgeStats>,
}

impl<S: RecordSink + 'static> Bridge<S> {
    /// Create a bridge from compiled rules.
    pub fn new(
        rules: RuleSet,
        sink: S,
        flush_interval: Duration,
        max_buffered: Option<usize>,
    ) -> Self {
        let stats = Arc::new(BridgeStats::new());
        Self {
            rules: Arc::new(rules),
            batcher: Arc::new(Batcher::with_limit(max_buffered, Arc::clone(&stats))),
            sink: Arc::new(sink),
            flush_interval,
            stats,
        }
    }

    /// Create a bridge from a validated configuration.
    pub fn from_config(config: &BridgeConfig, sink: S) -> Result<Self, BridgeError> {
        let rules = RuleSet::from_config(&config.sync)?;
        Ok(Self::new(
            rules,
            sink,
            config.influx.flush_interval(),
            config.influx.max_buffered,
        ))
    }

    /// Compiled rules.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Record buffer.
    pub fn batcher(&self) -> &Batcher {
        &self.batcher
    }

    /// Storage sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Shared statistics.
    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    /// Map one message and buffer the result.
    ///
    /// Returns `false` if no rule matched; the message is then ignored.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> bool {
        match self.rules.map_now(topic, payload) {
            Some(record) => {
                tracing::trace!("Topic '{}' mapped to '{}'", topic, record.measurement);
                self.stats.record_message(true);
                self.batcher.append(record);
                true
            }
            None => {
                tracing::trace!("No rule matched topic '{}'", topic);
                self.stats.record_message(false);
                false
            }
        }
    }

    /// Flush the buffer now.
    pub async fn flush(&self) -> FlushOutcome {
        self.batcher.flush_tick(self.sink.as_ref()).await
    }

    /// Run until `source` ends or `shutdown` completes.
    ///
    /// Source errors stop the loop and are returned after the final flush.
    pub async fn run<M, F>(&self, mut source: M, shutdown: F) -> Result<(), BridgeError>
    where
        M: MessageSource,
        F: Future<Output = ()>,
    {
        tracing::info!(
            "Bridge started with {} rules, flushing every {:?}",
            self.rules.len(),
            self.flush_interval
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let flusher = tokio::spawn(flush_loop(
            Arc::clone(&self.batcher),
            Arc::clone(&self.sink),
            self.flush_interval,
            stop_rx,
        ));

        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break Ok(());
                }
                next = source.next_message() => match next {
                    Ok(Some(message)) => {
                        self.handle_message(&message.topic, &message.payload);
                    }
                    Ok(None) => {
                        tracing::info!("Message source closed");
                        break Ok(());
                    }
                    Err(e) => break Err(BridgeError::Source(e)),
                },
            }
        };

        let _ = stop_tx.send(true);
        if let Err(e) = flusher.await {
            tracing::warn!("Flush task ended abnormally: {}", e);
        }

        match self.flush().await {
            FlushOutcome::Idle => {}
            FlushOutcome::Written(n) => tracing::info!("Final flush wrote {} records", n),
            FlushOutcome::Retained { records, error } => {
                tracing::warn!("Final flush failed, {} records lost: {}", records, error)
            }
        }

        tracing::info!("Bridge stopped");
        result
    }
}

async fn flush_loop<S: RecordSink + 'static>(
    batcher: Arc<Batcher>,
    sink: Arc<S>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                batcher.flush_tick(sink.as_ref()).await;
            }
            _ = stop.changed() => break,
        }
    }
}
