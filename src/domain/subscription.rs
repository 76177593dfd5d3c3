use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A standing registration of interest in a topic pattern.
///
/// Entries only reach the index after a successful intent verification, so
/// validity reduces to "lease not yet expired".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub topic_pattern: String,
    pub callback_url: String,
    pub expiry: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_none_or(|expiry| expiry > now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// `hub.mode` of a subscription request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubMode {
    Subscribe,
    Unsubscribe,
}

impl HubMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HubMode::Subscribe => "subscribe",
            HubMode::Unsubscribe => "unsubscribe",
        }
    }
}
