use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use std::sync::Arc;
use tracing::info;

use super::messages::{EventMessage, StatusMessage};
use crate::event::{EventNotice, Notifier};

pub struct NatsClient {
    client: Client,
    subject_prefix: String,
    device_id: String,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, subject_prefix: &str, device_id: String) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            subject_prefix: subject_prefix.to_string(),
            device_id,
        })
    }

    /// Subject for one kind of message from this device
    pub fn subject(&self, kind: &str) -> String {
        event_subject(&self.subject_prefix, &self.device_id, kind)
    }

    /// Publish a sound event
    pub async fn publish_event(&self, message: &EventMessage) -> Result<()> {
        let subject = self.subject("event");
        let payload = serde_json::to_vec(message)?;

        self.client.publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish event")?;

        self.client.flush()
            .await
            .context("Failed to flush event")?;

        info!(
            "Published event to {} (file={}, amplitude={})",
            subject, message.file, message.amplitude
        );

        Ok(())
    }

    /// Publish device status (online announcement)
    pub async fn publish_status(&self, message: &StatusMessage) -> Result<()> {
        let subject = self.subject("status");
        let payload = serde_json::to_vec(message)?;

        self.client.publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish status")?;

        info!("Published status '{}' to {}", message.status, subject);

        Ok(())
    }
}

pub fn event_subject(prefix: &str, device_id: &str, kind: &str) -> String {
    format!("{}.{}.{}", prefix, device_id, kind)
}

/// Build the wire message for a stored event
pub fn event_message(notice: &EventNotice) -> EventMessage {
    let pcm = notice.samples.as_ref().map(|samples| {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    });

    EventMessage {
        device_id: notice.device_id.clone(),
        file: notice.handle.clone(),
        amplitude: notice.trigger_amplitude,
        timestamp: notice.timestamp.to_rfc3339(),
        sample_rate: notice.sample_rate,
        duration_secs: notice.duration_secs(),
        samples: notice.sample_count,
        pcm,
    }
}

/// Sends event notices as NATS messages
pub struct NatsNotifier {
    client: Arc<NatsClient>,
}

impl NatsNotifier {
    pub fn new(client: Arc<NatsClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Notifier for NatsNotifier {
    async fn notify(&self, notice: &EventNotice) -> Result<()> {
        self.client.publish_event(&event_message(notice)).await
    }

    fn name(&self) -> &str {
        "nats"
    }
}
