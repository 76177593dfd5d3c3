use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Delivery state of a relayed message.
///
/// Only `Received` and `Delivered` are produced by the relay pipeline; the
/// remaining states are written by other parts of the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Received,
    Delivered,
    Confirmed,
    Revoked,
    Undeliverable,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Received => "received",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Confirmed => "confirmed",
            MessageStatus::Revoked => "revoked",
            MessageStatus::Undeliverable => "undeliverable",
        }
    }
}

/// A trade-document notification in transit.
///
/// `payload` is opaque to the hub and forwarded as-is. `id` is assigned the
/// first time the message is persisted and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub status: MessageStatus,
    pub payload: Map<String, Value>,
}

impl Message {
    pub fn new(payload: Map<String, Value>) -> Self {
        Self {
            id: None,
            status: MessageStatus::Received,
            payload,
        }
    }

    /// Returns the message id, generating one if the message has none yet.
    pub fn ensure_id(&mut self) -> Uuid {
        *self.id.get_or_insert_with(Uuid::new_v4)
    }

    pub fn is_delivered(&self) -> bool {
        self.status == MessageStatus::Delivered
    }
}
