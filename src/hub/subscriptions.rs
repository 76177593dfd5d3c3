//! Subscription lifecycle: every (un)subscribe request is confirmed with the
//! callback owner before the index is touched.
//!
//! The hub GETs the callback with `hub.mode`, `hub.topic`, `hub.challenge`
//! and `hub.lease_seconds`; only a 200 response whose body is exactly the
//! challenge counts as confirmation.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::StatusCode;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{HubMode, Pattern, Subscription};
use crate::repos::SubscriptionIndex;
use crate::utils::error::HubError;

pub struct IntentVerifier {
    http: reqwest::Client,
}

impl IntentVerifier {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn verify(
        &self,
        callback: &str,
        mode: HubMode,
        topic: &str,
        lease_seconds: Option<u64>,
    ) -> Result<(), HubError> {
        let challenge = Uuid::new_v4().to_string();
        let mut params = vec![
            ("hub.mode", mode.as_str().to_string()),
            ("hub.topic", topic.to_string()),
            ("hub.challenge", challenge.clone()),
        ];
        if let Some(lease) = lease_seconds {
            params.push(("hub.lease_seconds", lease.to_string()));
        }

        let rejected = || HubError::IntentVerificationFailed {
            callback: callback.to_string(),
        };

        let response = match self.http.get(callback).query(&params).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%callback, error = %e, "Intent verification request failed");
                return Err(rejected());
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            warn!(%callback, status = status.as_u16(), "Intent verification refused");
            return Err(rejected());
        }

        match response.bytes().await {
            Ok(body) if body.as_ref() == challenge.as_bytes() => Ok(()),
            Ok(_) => {
                warn!(%callback, "Intent verification echoed a wrong challenge");
                Err(rejected())
            }
            Err(e) => {
                warn!(%callback, error = %e, "Intent verification body unreadable");
                Err(rejected())
            }
        }
    }
}

/// `REQUESTED -> VERIFIED | REJECTED` per `(pattern, callback)`: the index is
/// only mutated after the callback confirmed the request.
pub struct SubscriptionLifecycle {
    index: Arc<dyn SubscriptionIndex>,
    verifier: IntentVerifier,
}

impl SubscriptionLifecycle {
    pub fn new(index: Arc<dyn SubscriptionIndex>, verifier: IntentVerifier) -> Self {
        Self { index, verifier }
    }

    /// Subscribes `callback` to `topic`, replacing any previous registration
    /// of the same pair.
    pub async fn register(
        &self,
        callback: &str,
        topic: &str,
        lease_seconds: Option<u64>,
    ) -> Result<Subscription, HubError> {
        let pattern = Pattern::new(topic)?;
        self.verifier
            .verify(callback, HubMode::Subscribe, pattern.as_str(), lease_seconds)
            .await?;

        let expiry = lease_seconds.map(lease_end);
        self.index
            .subscribe_by_pattern(&pattern, callback, expiry)
            .await?;
        info!(%callback, topic = %pattern, ?expiry, "Subscribed");

        Ok(Subscription {
            topic_pattern: pattern.as_str().to_string(),
            callback_url: callback.to_string(),
            expiry,
        })
    }

    pub async fn deregister(&self, callback: &str, topic: &str) -> Result<(), HubError> {
        let pattern = Pattern::new(topic)?;
        self.verifier
            .verify(callback, HubMode::Unsubscribe, pattern.as_str(), None)
            .await?;

        // Subscriptions on parent patterns count as registered; only the
        // `(topic, callback)` key itself is removed.
        let registered = self
            .index
            .get_subscriptions_by_pattern(&pattern)
            .await?
            .iter()
            .any(|s| s.callback_url == callback);
        if !registered {
            return Err(HubError::SubscriptionNotFound {
                callback: callback.to_string(),
                topic: pattern.as_str().to_string(),
            });
        }

        self.index.bulk_delete(&[pattern.to_key(callback)]).await?;
        info!(%callback, topic = %pattern, "Unsubscribed");
        Ok(())
    }
}

fn lease_end(lease_seconds: u64) -> DateTime<Utc> {
    let now = Utc::now();
    i64::try_from(lease_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|lease| now.checked_add_signed(lease))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
