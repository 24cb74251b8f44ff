// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT broker subscription.
//!
//! Subscribes to the configured topic filter on every (re)connect and yields
//! publishes as [`InboundMessage`]s. Connection errors are logged and the
//! client retries after a one-second pause.

use crate::config::MqttConfig;
use crate::source::{InboundMessage, MessageSource, SourceError};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;

const DEFAULT_PORT: u16 = 1883;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 100;

/// MQTT message source.
pub struct MqttSource {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    qos: QoS,
}

impl MqttSource {
    /// Create a source from the `[mqtt]` configuration section.
    ///
    /// No network traffic happens until the first [`MessageSource::next_message`].
    pub fn from_config(config: &MqttConfig) -> Result<Self, SourceError> {
        let (host, port) = parse_broker_address(&config.host)?;
        let qos = qos_from_level(config.qos)?;

        let mut options = MqttOptions::new(config.client_id.clone(), host, port);
        options.set_keep_alive(KEEP_ALIVE);
        if !config.user.is_empty() {
            options.set_credentials(config.user.clone(), config.password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        Ok(Self {
            client,
            eventloop,
            topic: config.topic.clone(),
            qos,
        })
    }

    /// Subscription filter.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl MessageSource for MqttSource {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, SourceError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("Connected to broker, subscribing to '{}'", self.topic);
                    self.client
                        .try_subscribe(self.topic.clone(), self.qos)
                        .map_err(|e| SourceError::Subscribe(e.to_string()))?;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(Some(InboundMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    }));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("MQTT connection error: {}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}

/// Split `tcp://host:port` into host and port.
///
/// Accepts `tcp://`, `mqtt://` or no scheme; the port defaults to 1883.
pub fn parse_broker_address(address: &str) -> Result<(String, u16), SourceError> {
    let invalid = || SourceError::Address(address.to_string());

    let rest = match address.split_once("://") {
        Some(("tcp" | "mqtt", rest)) => rest,
        Some(_) => return Err(invalid()),
        None => address,
    };
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
        None => (rest, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}

fn qos_from_level(level: u8) -> Result<QoS, SourceError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(SourceError::Subscribe(format!("unsupported QoS {}", other))),
    }
}
