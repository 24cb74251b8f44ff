// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time-series record produced by the topic mapper.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the synthetic field emitted for event-marker payloads.
pub const EVENT_FIELD: &str = "occurred";

/// A value that can be stored in a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit floating point, parsed from a numeric payload.
    Float(f64),
    /// Boolean, parsed from a `true`/`false` payload.
    Boolean(bool),
    /// Opaque UTF-8 text.
    String(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
            FieldValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// One tagged, timestamped point.
///
/// Tags and fields are kept in sorted maps so the rendered line protocol is
/// canonical. A record built by [`RuleSet`](crate::RuleSet) always carries at
/// least one field, and its tag keys never repeat a field key except for the
/// synthetic [`EVENT_FIELD`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Measurement name, taken from the matching rule.
    pub measurement: String,
    /// Indexed string dimensions.
    pub tags: BTreeMap<String, String>,
    /// Measured values.
    pub fields: BTreeMap<String, FieldValue>,
    /// Processing time of the inbound message.
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// Create a record with no tags and no fields.
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a field.
    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// True if this record was produced from an event-marker payload.
    pub fn is_event(&self) -> bool {
        self.fields.len() == 1
            && matches!(self.fields.get(EVENT_FIELD), Some(FieldValue::Boolean(true)))
    }
}
