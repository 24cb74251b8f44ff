// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Storage sinks.
//!
//! The batcher only needs to know whether a batch write succeeded. Three
//! implementations are provided:
//!
//! - [`InfluxSink`] -- InfluxDB 1.x HTTP `/write` endpoint
//! - [`StdoutSink`] -- prints Line Protocol (dry run)
//! - [`MemorySink`] -- keeps batches in memory, can be told to fail (testing)

use crate::config::InfluxConfig;
use crate::influx::{LineProtocolError, LineProtocolWriter, Precision};
use crate::record::Record;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;

/// Sink write errors.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("encoding error: {0}")]
    Encode(#[from] LineProtocolError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected write with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid URL '{0}'")]
    Url(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Batch write interface of a storage backend.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Write all records as one batch.
    async fn write_batch(&self, records: &[Record]) -> Result<(), SinkError>;
}

/// InfluxDB 1.x HTTP writer.
pub struct InfluxSink {
    client: reqwest::Client,
    write_url: reqwest::Url,
    user: String,
    password: String,
    precision: Precision,
}

impl InfluxSink {
    /// Create a sink from the `[influx]` configuration section.
    pub fn from_config(config: &InfluxConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Self::with_client(client, config)
    }

    /// Create a sink with a caller-provided HTTP client.
    pub fn with_client(client: reqwest::Client, config: &InfluxConfig) -> Result<Self, SinkError> {
        let write_url = write_url(&config.host, &config.database, config.precision)?;
        Ok(Self {
            client,
            write_url,
            user: config.user.clone(),
            password: config.password.clone(),
            precision: config.precision,
        })
    }

    /// Endpoint points are posted to.
    pub fn write_url(&self) -> &reqwest::Url {
        &self.write_url
    }
}

/// Build `<host>/write?db=<database>&precision=<p>`.
fn write_url(host: &str, database: &str, precision: Precision) -> Result<reqwest::Url, SinkError> {
    let base = format!("{}/write", host.trim_end_matches('/'));
    let mut url = reqwest::Url::parse(&base).map_err(|_| SinkError::Url(host.to_string()))?;
    url.query_pairs_mut()
        .append_pair("db", database)
        .append_pair("precision", precision.as_query());
    Ok(url)
}

#[async_trait]
impl RecordSink for InfluxSink {
    async fn write_batch(&self, records: &[Record]) -> Result<(), SinkError> {
        let mut writer = LineProtocolWriter::new(self.precision);
        writer.write_batch(records)?;
        let body = writer.flush_body();

        let mut request = self.client.post(self.write_url.clone()).body(body);
        if !self.user.is_empty() {
            request = request.basic_auth(&self.user, Some(&self.password));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

/// Prints batches as Line Protocol on stdout.
pub struct StdoutSink {
    precision: Precision,
}

impl StdoutSink {
    /// Create a new stdout sink.
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }
}

#[async_trait]
impl RecordSink for StdoutSink {
    async fn write_batch(&self, records: &[Record]) -> Result<(), SinkError> {
        let mut writer = LineProtocolWriter::new(self.precision);
        writer.write_batch(records)?;

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for line in writer.flush() {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// In-memory sink for tests and embedding.
///
/// Not re-exported from the crate root; use `mqtt2influx::sink::MemorySink`.
///
/// Stores every accepted batch. Writes fail while the sink is marked as
/// failing, or for the next `n` calls after [`MemorySink::fail_next`].
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<Record>>>,
    failing: Mutex<bool>,
    fail_budget: Mutex<usize>,
    attempts: Mutex<usize>,
    delay: Mutex<Option<Duration>>,
}

impl MemorySink {
    /// Create an empty, healthy sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write until called again with `false`.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Fail the next `n` writes.
    pub fn fail_next(&self, n: usize) {
        *self.fail_budget.lock() = n;
    }

    /// Sleep this long inside every write.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Accepted batches, in write order.
    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.batches.lock().clone()
    }

    /// Accepted records, flattened.
    pub fn records(&self) -> Vec<Record> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Number of write attempts, successful or not.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write_batch(&self, records: &[Record]) -> Result<(), SinkError> {
        *self.attempts.lock() += 1;

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.failing.lock() {
            return Err(SinkError::Unavailable("memory sink marked as failing".into()));
        }
        {
            let mut budget = self.fail_budget.lock();
            if *budget > 0 {
                *budget -= 1;
                return Err(SinkError::Unavailable("injected failure".into()));
            }
        }

        self.batches.lock().push(records.to_vec());
        Ok(())
    }
}
