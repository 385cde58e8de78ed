use std::time::Duration;

use lapin::{
    BasicProperties, Channel,
    options::BasicPublishOptions,
};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::EVENTS_EXCHANGE;

/// A progress event for one processing stage. Serialized as the payload of a
/// `jobStatusUpdate` for ingestion jobs, or published bare for generators.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub stage: String,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    /// Stage-specific fields merged into the payload.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatusEvent {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            error: false,
            extra: Map::new(),
        }
    }

    pub fn failed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            error: true,
            extra: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Publishes status events to the fylr-events exchange. Publishes are
/// best-effort: a failure is logged, never propagated, so progress reporting
/// cannot block the ack of a successful message. The timeout bounds how long
/// a publish may sit on a connection the broker has blocked for flow
/// control; past it the event is dropped.
#[derive(Clone)]
pub struct StatusPublisher {
    channel: Channel,
    publish_timeout: Duration,
}

impl StatusPublisher {
    pub fn new(channel: Channel, publish_timeout: Duration) -> Self {
        Self {
            channel,
            publish_timeout,
        }
    }

    /// Publish a `jobStatusUpdate` for an ingestion job under
    /// `job.<jobKey>.status`.
    pub async fn job_status(&self, job_key: &str, event: &StatusEvent) {
        let routing_key = format!("job.{job_key}.status");
        let body = json!({
            "eventName": "jobStatusUpdate",
            "payload": event,
        });

        self.publish(&routing_key, &body).await;
    }

    /// Publish a generator status event under `<entity>.<id>.status`.
    pub async fn entity_status(&self, entity_type: &str, entity_id: &str, event: &StatusEvent) {
        let routing_key = format!("{entity_type}.{entity_id}.status");
        let body = serde_json::to_value(event).unwrap_or_else(|_| json!({"stage": event.stage}));

        self.publish(&routing_key, &body).await;
    }

    async fn publish(&self, routing_key: &str, body: &Value) {
        if !self.channel.status().connected() {
            log::warn!("Channel is closed, cannot publish status update to {routing_key}");
            return;
        }

        let payload = match serde_json::to_vec(body) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to serialize status event for {routing_key}: {e}");
                return;
            }
        };

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2);

        let publish = self.channel.basic_publish(
            EVENTS_EXCHANGE,
            routing_key,
            BasicPublishOptions::default(),
            &payload,
            properties,
        );

        match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(Ok(_)) => log::debug!("Published status to {routing_key}"),
            Ok(Err(e)) => log::error!("Failed to publish status update to {routing_key}: {e}"),
            Err(_) => log::error!(
                "Publish to {routing_key} still pending after {:?}; connection is blocked, dropping event",
                self.publish_timeout
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_event_body_shape() {
        let event = StatusEvent::new("VECTORIZING", "Split text into 3 chunks.");
        let body = json!({
            "eventName": "jobStatusUpdate",
            "payload": event,
        });

        assert_eq!(
            body,
            json!({
                "eventName": "jobStatusUpdate",
                "payload": {
                    "stage": "VECTORIZING",
                    "message": "Split text into 3 chunks.",
                },
            })
        );
    }

    #[test]
    fn failed_event_carries_error_flag_and_extras() {
        let event = StatusEvent::failed("FAILED", "No text could be extracted from the file.")
            .with("sourceId", json!("s1"));

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "stage": "FAILED",
                "message": "No text could be extracted from the file.",
                "error": true,
                "sourceId": "s1",
            })
        );
    }
}
