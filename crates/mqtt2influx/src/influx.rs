// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB Line Protocol encoding.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use crate::record::{FieldValue, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while encoding records.
#[derive(Debug, Error)]
pub enum LineProtocolError {
    #[error("record for measurement '{0}' has no fields")]
    NoFields(String),

    #[error("timestamp {0} is outside the representable range")]
    Timestamp(DateTime<Utc>),
}

/// Timestamp precision used when writing points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Precision {
    #[serde(rename = "ns")]
    Nanoseconds,
    #[serde(rename = "us")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[default]
    #[serde(rename = "s")]
    Seconds,
}

impl Precision {
    /// Value of the `precision` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            Precision::Nanoseconds => "ns",
            Precision::Microseconds => "us",
            Precision::Milliseconds => "ms",
            Precision::Seconds => "s",
        }
    }

    /// Convert a timestamp to an integer count of this precision's unit.
    pub fn timestamp(self, ts: DateTime<Utc>) -> Result<i64, LineProtocolError> {
        match self {
            Precision::Nanoseconds => ts
                .timestamp_nanos_opt()
                .ok_or(LineProtocolError::Timestamp(ts)),
            Precision::Microseconds => Ok(ts.timestamp_micros()),
            Precision::Milliseconds => Ok(ts.timestamp_millis()),
            Precision::Seconds => Ok(ts.timestamp()),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FieldValue {
    /// Format this value for Line Protocol.
    ///
    /// - Float: shortest representation that round-trips (e.g., `1.3`, `-5`)
    /// - String: quoted with double quotes, inner quotes escaped
    /// - Boolean: `true` or `false`
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
            FieldValue::Boolean(v) => v.to_string(),
        }
    }
}

/// Line Protocol writer.
///
/// Accumulates encoded records and hands them out as one request body.
#[derive(Debug)]
pub struct LineProtocolWriter {
    precision: Precision,
    lines: Vec<String>,
}

impl LineProtocolWriter {
    /// Create a new empty writer.
    pub fn new(precision: Precision) -> Self {
        Self {
            precision,
            lines: Vec::new(),
        }
    }

    /// Encode a single record.
    ///
    /// Tags with an empty value are omitted (Line Protocol does not allow
    /// them).
    pub fn write_record(&mut self, record: &Record) -> Result<(), LineProtocolError> {
        if record.fields.is_empty() {
            return Err(LineProtocolError::NoFields(record.measurement.clone()));
        }

        let mut line = escape_measurement(&record.measurement);

        // BTreeMap iteration keeps tags sorted by key
        for (key, value) in record.tags.iter().filter(|(_, v)| !v.is_empty()) {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_tag_value(value));
        }

        line.push(' ');

        for (i, (key, value)) in record.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_line_protocol());
        }

        line.push(' ');
        line.push_str(&self.precision.timestamp(record.timestamp)?.to_string());

        self.lines.push(line);
        Ok(())
    }

    /// Encode a batch of records.
    pub fn write_batch(&mut self, records: &[Record]) -> Result<(), LineProtocolError> {
        records.iter().try_for_each(|r| self.write_record(r))
    }

    /// Take all accumulated lines.
    pub fn flush(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    /// Take all accumulated lines joined with `\n`, ready for an HTTP body.
    pub fn flush_body(&mut self) -> String {
        self.flush().join("\n")
    }

    /// Number of buffered lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the writer is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Escape a measurement name: commas and spaces.
fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

/// Escape tag keys and field keys: commas, equals signs and spaces.
fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

/// Escape a tag value.
///
/// Event tags carry raw payload text, so the value may hold any byte the
/// publisher sent, including backslashes and line breaks.
fn escape_tag_value(s: &str) -> String {
    escape_key(s)
}

/// Backslash-escape `special` characters.
///
/// A literal backslash is doubled so it can never swallow the following
/// delimiter, and line breaks are written as `\n` / `\r` since Line Protocol
/// has no way to carry them inside a key or tag.
fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}
