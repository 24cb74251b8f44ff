// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge configuration.
//!
//! Loaded once from a TOML file at startup and passed by value to the
//! components that need it.
//!
//! ```toml
//! [mqtt]
//! host = "tcp://127.0.0.1:1883"
//! topic = "#"
//!
//! [influx]
//! host = "http://localhost:8086"
//! database = "telemetry"
//! interval = 10
//!
//! [[sync]]
//! pattern = '/sensors/(?P<room>\w+)/\w+'
//! measurement = "sensors"
//! ```

use crate::influx::Precision;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid pattern #{index} '{pattern}': {source}")]
    Pattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Statistics logging interval (seconds, 0 disables).
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Message source connection.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Storage backend connection and batching.
    pub influx: InfluxConfig,

    /// Topic rules, evaluated in order.
    #[serde(default)]
    pub sync: Vec<SyncRuleConfig>,
}

/// `[mqtt]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker address (`tcp://host:port`).
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    /// Username (empty = anonymous).
    #[serde(default)]
    pub user: String,

    /// Password (empty = none).
    #[serde(default)]
    pub password: String,

    /// Subscription filter.
    #[serde(default = "default_mqtt_topic")]
    pub topic: String,

    /// Client identifier presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Subscription QoS (0, 1 or 2).
    #[serde(default = "default_qos")]
    pub qos: u8,
}

/// `[influx]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Server URL.
    #[serde(default = "default_influx_host")]
    pub host: String,

    /// Username (empty = no authentication).
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Target database.
    #[serde(default)]
    pub database: String,

    /// Flush interval (seconds).
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Timestamp precision of written points.
    #[serde(default)]
    pub precision: Precision,

    /// HTTP request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum number of records held while the server is unreachable.
    /// Unset keeps every record until it is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_buffered: Option<usize>,
}

/// One `[[sync]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRuleConfig {
    /// Regular expression searched in the topic.
    pub pattern: String,

    /// Measurement name for matching messages.
    pub measurement: String,
}

fn default_stats_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mqtt_host() -> String {
    "tcp://127.0.0.1:1883".to_string()
}

fn default_mqtt_topic() -> String {
    "#".to_string()
}

fn default_client_id() -> String {
    "mqtt2influx".to_string()
}

fn default_qos() -> u8 {
    2
}

fn default_influx_host() -> String {
    "http://localhost:8086".to_string()
}

fn default_interval() -> u64 {
    10
}

fn default_timeout() -> u64 {
    10
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            user: String::new(),
            password: String::new(),
            topic: default_mqtt_topic(),
            client_id: default_client_id(),
            qos: default_qos(),
        }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: default_influx_host(),
            user: String::new(),
            password: String::new(),
            database: String::new(),
            interval: default_interval(),
            precision: Precision::default(),
            timeout: default_timeout(),
            max_buffered: None,
        }
    }
}

impl InfluxConfig {
    /// Flush interval as a duration.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// HTTP timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Connection overrides given on the command line.
#[derive(Debug, Clone, Default)]
pub struct MqttOverrides {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub topic: Option<String>,
}

impl BridgeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Apply command-line overrides, then re-validate.
    pub fn apply_overrides(&mut self, overrides: MqttOverrides) -> Result<(), ConfigError> {
        if let Some(host) = overrides.host {
            self.mqtt.host = host;
        }
        if let Some(user) = overrides.user {
            self.mqtt.user = user;
        }
        if let Some(password) = overrides.password {
            self.mqtt.password = password;
        }
        if let Some(topic) = overrides.topic {
            self.mqtt.topic = topic;
        }
        self.validate()
    }

    /// Validate required settings.
    ///
    /// Pattern syntax is checked separately by
    /// [`RuleSet::from_config`](crate::RuleSet::from_config).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.host.trim().is_empty() {
            return Err(ConfigError::Invalid("mqtt.host is required".into()));
        }
        if self.mqtt.topic.is_empty() {
            return Err(ConfigError::Invalid("mqtt.topic is required".into()));
        }
        if self.mqtt.qos > 2 {
            return Err(ConfigError::Invalid(format!(
                "mqtt.qos must be 0, 1 or 2 (got {})",
                self.mqtt.qos
            )));
        }
        if self.influx.host.trim().is_empty() {
            return Err(ConfigError::Invalid("influx.host is required".into()));
        }
        if self.influx.database.trim().is_empty() {
            return Err(ConfigError::Invalid("influx.database is required".into()));
        }
        if self.influx.interval == 0 {
            return Err(ConfigError::Invalid(
                "influx.interval must be at least 1 second".into(),
            ));
        }
        if self.influx.timeout == 0 {
            return Err(ConfigError::Invalid(
                "influx.timeout must be at least 1 second".into(),
            ));
        }
        if self.influx.max_buffered == Some(0) {
            return Err(ConfigError::Invalid(
                "influx.max_buffered must be greater than 0 when set".into(),
            ));
        }
        if self.sync.is_empty() {
            return Err(ConfigError::Invalid("No [[sync]] rules configured".into()));
        }
        for (i, rule) in self.sync.iter().enumerate() {
            if rule.pattern.is_empty() {
                return Err(ConfigError::Invalid(format!("Rule {} has empty pattern", i)));
            }
            if rule.measurement.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "Rule {} has empty measurement",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Example configuration used by `gen-config`.
    pub fn example() -> Self {
        Self {
            stats_interval: default_stats_interval(),
            log_level: default_log_level(),
            mqtt: MqttConfig::default(),
            influx: InfluxConfig {
                database: "telemetry".into(),
                ..InfluxConfig::default()
            },
            sync: vec![
                SyncRuleConfig {
                    pattern: r"^/home/(?P<room>\w+)/(?P<sensor>\w+)/(\w+)$".into(),
                    measurement: "home".into(),
                },
                SyncRuleConfig {
                    pattern: r"^/devices/(?P<device>[\w-]+)/event$".into(),
                    measurement: "device_events".into(),
                },
            ],
        }
    }
}
