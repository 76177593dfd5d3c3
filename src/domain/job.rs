//! Job envelopes transported by the queues.
//!
//! Queues only ever see a JSON object; each consuming use case decodes the
//! envelope it expects. The attempt counter lives in the envelope itself so
//! it survives independent enqueue/dequeue cycles.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::utils::error::HubError;

/// Attempt number carried by a freshly created job.
pub const FIRST_ATTEMPT: u32 = 1;

fn first_attempt() -> u32 {
    FIRST_ATTEMPT
}

/// Conversion between a typed envelope and the queue's JSON payload.
pub trait JobEnvelope: Serialize + DeserializeOwned {
    fn to_payload(&self) -> Result<Value, HubError> {
        serde_json::to_value(self).map_err(HubError::JobEncoding)
    }

    fn from_payload(payload: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload)
    }
}

/// Relay job: send the referenced message to the foreign endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayJob {
    pub message_id: Uuid,
    #[serde(default = "first_attempt")]
    pub retry: u32,
}

impl RelayJob {
    pub fn new(message_id: Uuid) -> Self {
        Self {
            message_id,
            retry: FIRST_ATTEMPT,
        }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            message_id: self.message_id,
            retry: self.retry.saturating_add(1),
        }
    }
}

impl JobEnvelope for RelayJob {}

/// Reference to a newly arrived message, as announced to subscribers.
///
/// The id is whatever the partner channel sent, string or number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub id: Value,
}

/// Notification job: fan `content` out to everyone subscribed to `topic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub topic: String,
    pub content: NotificationContent,
}

impl NotificationJob {
    pub fn for_jurisdiction(jurisdiction: &str, content: NotificationContent) -> Self {
        Self {
            topic: format!("jurisdiction.{jurisdiction}"),
            content,
        }
    }
}

impl JobEnvelope for NotificationJob {}

/// Outbox job: POST `payload` to a single subscriber callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxJob {
    pub callback_url: String,
    pub payload: Value,
    #[serde(default = "first_attempt")]
    pub retry: u32,
}

impl OutboxJob {
    pub fn new(callback_url: impl Into<String>, payload: Value) -> Self {
        Self {
            callback_url: callback_url.into(),
            payload,
            retry: FIRST_ATTEMPT,
        }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            callback_url: self.callback_url.clone(),
            payload: self.payload.clone(),
            retry: self.retry.saturating_add(1),
        }
    }
}

impl JobEnvelope for OutboxJob {}
