//! Best-effort publishing of detected links.

use crate::session::mqtt::MqttSession;
use chrono::{DateTime, Utc};
use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// A link seen in the channel, as published on the links topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkEvent {
    pub url: String,
    pub channel: String,
    pub nick: String,
    pub at: DateTime<Utc>,
}

/// Publishes link events to the links topic without ever stalling or
/// failing the chat pipeline.
pub struct LinkPublisher {
    session: MqttSession,
    topic: String,
    timeout: Duration,
}

impl LinkPublisher {
    pub fn new(session: MqttSession, topic: String, timeout: Duration) -> Self {
        Self {
            session,
            topic,
            timeout,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish one link event, best effort.
    ///
    /// The event is dropped with a warning when the broker session is not
    /// currently connected, when serialization fails, or when the publish
    /// does not complete within the configured timeout. Chat processing
    /// must keep flowing regardless of broker health, so none of these
    /// cases return an error.
    pub async fn publish(&self, event: &LinkEvent) {
        if !self.session.is_connected() {
            warn!(url = %event.url, "broker session not connected, dropping link");
            return;
        }

        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(url = %event.url, error = %e, "failed to serialize link event");
                return;
            }
        };

        let publish = self
            .session
            .publish(&self.topic, QoS::AtLeastOnce, false, payload);
        match tokio::time::timeout(self.timeout, publish).await {
            Ok(Ok(())) => {
                debug!(url = %event.url, topic = %self.topic, "link relayed");
            }
            Ok(Err(e)) => {
                warn!(url = %event.url, error = %e, "publish failed, dropping link");
            }
            Err(_) => {
                warn!(url = %event.url, timeout = ?self.timeout, "publish timed out, dropping link");
            }
        }
    }
}
