// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound message sources.
//!
//! The bridge pulls `(topic, payload)` pairs from a [`MessageSource`]. The
//! broker client lives in [`crate::mqtt`]; [`ChannelSource`] feeds messages
//! from an in-process channel.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Source errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid broker address '{0}'")]
    Address(String),

    #[error("subscription failed: {0}")]
    Subscribe(String),

    #[error("connection error: {0}")]
    Connection(String),
}

/// A stream of inbound messages.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next message. `Ok(None)` means the source is exhausted.
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, SourceError>;
}

/// Source backed by a tokio channel.
///
/// Ends once every sender has been dropped and the queue is drained.
pub struct ChannelSource {
    rx: mpsc::Receiver<InboundMessage>,
}

/// Create a channel source and the sender feeding it.
pub fn channel(capacity: usize) -> (mpsc::Sender<InboundMessage>, ChannelSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, ChannelSource { rx })
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, SourceError> {
        Ok(self.rx.recv().await)
    }
}
