// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT to InfluxDB bridge
//!
//! Subscribes to an MQTT broker, maps each message to a time-series point
//! with an ordered list of regex rules, and writes the points to InfluxDB in
//! batches on a fixed interval.
//!
//! This crate provides:
//! - TOML configuration of connections and topic rules
//! - Regex-driven mapping of topic + payload to tags and fields
//! - InfluxDB Line Protocol generation
//! - A batching buffer that retains records across failed writes
//!
//! # Overview
//!
//! ```text
//! MQTT (topic, payload) --> RuleSet --> Batcher --(interval)--> RecordSink
//! ```
//!
//! Numeric and boolean payloads become a field named after the topic (or
//! its unnamed capture groups). Anything else is recorded as an event: the
//! text becomes a tag and the point carries a single `occurred=true` field.
//!
//! # Example
//!
//! ```
//! use mqtt2influx::{FieldValue, Rule, RuleSet};
//!
//! let rules = RuleSet::new(vec![
//!     Rule::new(r"/home/(?P<room>\w+)/(\w+)", "home").unwrap(),
//! ]);
//!
//! let record = rules.map_now("/home/kitchen/temperature", b"21.5").unwrap();
//! assert_eq!(record.tags["room"], "kitchen");
//! assert_eq!(record.fields["temperature"], FieldValue::Float(21.5));
//! ```

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod influx;
pub mod mapping;
pub mod mqtt;
pub mod record;
pub mod rules;
pub mod sink;
pub mod source;
pub mod stats;

pub use bridge::{Bridge, BridgeError};
pub use buffer::{Batcher, FlushOutcome};
pub use config::{BridgeConfig, ConfigError, MqttOverrides};
pub use influx::{LineProtocolWriter, Precision};
pub use mqtt::MqttSource;
pub use record::{FieldValue, Record, EVENT_FIELD};
pub use rules::{Rule, RuleSet};
pub use sink::{InfluxSink, RecordSink, SinkError, StdoutSink};
pub use source::{ChannelSource, InboundMessage, MessageSource, SourceError};
pub use stats::{BridgeStats, BridgeStatsSnapshot};
