//! Outbound domain events.
//!
//! Publishing is best effort: callers log a failed publish and carry on, so
//! nothing here retries or buffers.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

/// Topic carrying [`PostCreated`] payloads.
pub const POST_CREATE_TOPIC: &str = "post-create";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker connection failed: {0}")]
    Connect(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct PostCreated {
    pub post_id: String,
    pub author: String,
    pub content: String,
}

impl PostCreated {
    pub fn encode(&self) -> Result<Vec<u8>, PublishError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// Publishes to a NATS subject named after the topic.
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub async fn connect(url: &str) -> Result<Self, PublishError> {
        let client = async_nats::ConnectOptions::new()
            .name("forum-server")
            .connect(url)
            .await
            .map_err(|e| PublishError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .publish(topic.to_string(), Bytes::from(payload))
            .await
            .map_err(|e| PublishError::Publish(e.to_string()))
    }
}

/// Used when no broker is configured: events are only logged.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        tracing::debug!(topic, bytes = payload.len(), "Event publishing disabled");
        Ok(())
    }
}
