//! The `error` module defines the error types used within `channelhub`.
//!
//! Two groups live here:
//! - delivery outcomes (`DeliveryFailure`, `InvalidCallbackResponse`) which are
//!   returned as plain `Result` values and consumed by the retry logic of the
//!   worker that produced them;
//! - faults (`RepoError`, `HubError`) which propagate out of a use case and fail
//!   the current worker iteration or HTTP request.

use uuid::Uuid;

/// Failure reported by a `MessageStore`, `JobQueue` or `SubscriptionIndex`.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("failed to encode or decode stored record: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// The foreign endpoint did not accept a relayed message.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryFailure {
    #[error("foreign endpoint responded with non-OK response ({status}): {body:?}")]
    Rejected { status: u16, body: String },

    #[error("foreign endpoint unreachable: {0}")]
    Transport(#[source] reqwest::Error),
}

/// A subscriber callback did not accept a notification.
#[derive(Debug, thiserror::Error)]
pub enum InvalidCallbackResponse {
    #[error("subscription url {url} seems to be invalid, returns {status}")]
    Status { url: String, status: u16 },

    #[error("connection error, url: {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors surfaced by hub use cases.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("failed to encode job payload: {0}")]
    JobEncoding(#[source] serde_json::Error),

    #[error("intent verification failed for {callback}")]
    IntentVerificationFailed { callback: String },

    #[error("no subscription of {callback} to {topic}")]
    SubscriptionNotFound { callback: String, topic: String },

    #[error("invalid topic {topic:?}: {reason}")]
    InvalidTopic { topic: String, reason: &'static str },

    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
