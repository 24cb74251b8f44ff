// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ordered topic rules.
//!
//! Rules are compiled once at startup. For every inbound message the rules
//! are tried in configuration order and the first matching one produces the
//! record; later rules are never consulted.

use crate::config::{ConfigError, SyncRuleConfig};
use crate::mapping;
use crate::record::Record;
use chrono::{DateTime, Utc};
use regex::Regex;

/// A compiled topic rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    measurement: String,
}

impl Rule {
    /// Compile a rule.
    pub fn new(pattern: &str, measurement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            measurement: measurement.into(),
        })
    }

    /// Source text of the pattern.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Measurement written for matching messages.
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Check if this rule handles a topic.
    pub fn matches_topic(&self, topic: &str) -> bool {
        self.pattern.is_match(topic)
    }

    /// Map a message to a record, or `None` if the topic does not match.
    pub fn map(&self, topic: &str, payload: &[u8], timestamp: DateTime<Utc>) -> Option<Record> {
        let (tags, fields) = mapping::gather(&self.pattern, topic, payload)?;
        Some(Record {
            measurement: self.measurement.clone(),
            tags,
            fields,
            timestamp,
        })
    }
}

/// Immutable ordered rule list.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build a rule set from already compiled rules.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Compile the `[[sync]]` entries of a configuration.
    ///
    /// Fails on the first invalid pattern, reporting its position.
    pub fn from_config(entries: &[SyncRuleConfig]) -> Result<Self, ConfigError> {
        let rules = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                Rule::new(&entry.pattern, entry.measurement.clone()).map_err(|source| {
                    ConfigError::Pattern {
                        index,
                        pattern: entry.pattern.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// All rules, in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the rule that handles a topic.
    pub fn find_rule(&self, topic: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.matches_topic(topic))
    }

    /// Map a message with the first matching rule.
    pub fn map(&self, topic: &str, payload: &[u8], timestamp: DateTime<Utc>) -> Option<Record> {
        self.find_rule(topic)?.map(topic, payload, timestamp)
    }

    /// Map a message stamped with the current time.
    pub fn map_now(&self, topic: &str, payload: &[u8]) -> Option<Record> {
        self.map(topic, payload, Utc::now())
    }
}
