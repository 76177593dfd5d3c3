//! The `repos` module defines the storage collaborators the hub depends on
//! and ships two implementations of each:
//!
//! - `memory`: process-local stores, used by tests and `--in-memory` runs.
//! - `sled_store`: durable stores backed by an embedded `sled` database, one
//!   tree per store or queue.
//!
//! Use cases only ever hold `Arc<dyn Trait>` handles, so swapping the backing
//! store never touches use-case code.

pub mod memory;
pub mod sled_store;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{Message, Pattern, Subscription, SubscriptionKey};
use crate::utils::error::RepoError;

pub use memory::{MemoryJobQueue, MemoryMessageStore, MemorySubscriptionIndex};
pub use sled_store::{SledJobQueue, SledMessageStore, SledStore, SledSubscriptionIndex};

/// Queue of relay jobs consumed by the relay worker.
pub const RELAY_QUEUE: &str = "channel-messages";
/// Queue of notification jobs consumed by the callback spreader.
pub const NOTIFICATIONS_QUEUE: &str = "notifications";
/// Queue of per-subscriber delivery jobs consumed by the callback deliverer.
pub const DELIVERY_OUTBOX_QUEUE: &str = "delivery-outbox";

/// Orders jobs posted by this process within the same millisecond.
static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Identifier of a queued job, valid until the job is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Ids sort by enqueue time, so queues hand out older jobs first.
    pub(crate) fn generate() -> Self {
        let seq = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!(
            "{:020}_{:020}_{}",
            Utc::now().timestamp_millis(),
            seq,
            Uuid::new_v4()
        ))
    }

    pub(crate) fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A job handed out by `JobQueue::get_job`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: JobId,
    pub payload: Value,
}

/// Record kept by the queue implementations for every job not yet deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredJob {
    pub payload: Value,
    /// The job is hidden from `get_job` until this instant, either because it
    /// was posted with a delay or because a consumer currently holds it.
    pub visible_at: DateTime<Utc>,
}

/// Durable key-value store of messages keyed by their generated id.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists `message`, assigning an id first if it has none.
    async fn save_message(&self, message: Message) -> Result<Message, RepoError>;

    async fn get_message(&self, id: &Uuid) -> Result<Option<Message>, RepoError>;
}

/// At-least-once pull queue.
///
/// A job returned by `get_job` stays invisible to other consumers until it is
/// deleted or its visibility window lapses, after which it is handed out again.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn post_job(&self, payload: Value, delay_seconds: u64) -> Result<JobId, RepoError>;

    async fn get_job(&self) -> Result<Option<QueuedJob>, RepoError>;

    async fn delete(&self, job_id: &JobId) -> Result<(), RepoError>;
}

/// Pattern-indexed store of subscriptions.
#[async_trait]
pub trait SubscriptionIndex: Send + Sync {
    /// Upserts the `(pattern, callback_url)` entry.
    async fn subscribe_by_pattern(
        &self,
        pattern: &Pattern,
        callback_url: &str,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), RepoError>;

    /// Every stored subscription whose pattern matches the topic `pattern`.
    async fn get_subscriptions_by_pattern(
        &self,
        pattern: &Pattern,
    ) -> Result<Vec<Subscription>, RepoError>;

    async fn bulk_delete(&self, keys: &[SubscriptionKey]) -> Result<(), RepoError>;
}

pub(crate) fn visible_after(now: DateTime<Utc>, seconds: u64) -> DateTime<Utc> {
    let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
    chrono::TimeDelta::try_seconds(seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests;
