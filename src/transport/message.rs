use serde::{Deserialize, Serialize};

use crate::domain::HubMode;

/// WebSub subscription request, posted as `application/x-www-form-urlencoded`.
#[derive(Debug, Deserialize)]
pub struct SubscriptionForm {
    #[serde(rename = "hub.callback")]
    pub callback: String,

    #[serde(rename = "hub.topic")]
    pub topic: String,

    #[serde(rename = "hub.mode")]
    pub mode: HubMode,

    #[serde(rename = "hub.lease_seconds", default)]
    pub lease_seconds: Option<u64>,
}

/// Query string of `GET /messages/{id}`: a comma separated field list.
#[derive(Debug, Deserialize, Default)]
pub struct MessageQuery {
    pub fields: Option<String>,
}

impl MessageQuery {
    pub fn fields(&self) -> Vec<&str> {
        self.fields
            .as_deref()
            .map(|fields| fields.split(',').map(str::trim).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
