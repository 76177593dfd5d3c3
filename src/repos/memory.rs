//! In-process stores guarded by a `Mutex`.
//!
//! They implement the same contracts as the durable stores, including delayed
//! jobs and visibility timeouts, and add a few inspection helpers for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{
    JobId, JobQueue, MessageStore, QueuedJob, StoredJob, SubscriptionIndex, visible_after,
};
use crate::domain::{Message, Pattern, Subscription, SubscriptionKey};
use crate::utils::error::RepoError;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepoError> {
    mutex.lock().map_err(|_| RepoError::Poisoned)
}

#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: Mutex<HashMap<Uuid, Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn save_message(&self, mut message: Message) -> Result<Message, RepoError> {
        let id = message.ensure_id();
        lock(&self.messages)?.insert(id, message.clone());
        Ok(message)
    }

    async fn get_message(&self, id: &Uuid) -> Result<Option<Message>, RepoError> {
        Ok(lock(&self.messages)?.get(id).cloned())
    }
}

/// Snapshot of a job still held by a `MemoryJobQueue`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJob {
    pub id: JobId,
    pub payload: Value,
    pub visible_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MemoryJobQueue {
    name: String,
    visibility_timeout_secs: u64,
    jobs: Mutex<BTreeMap<JobId, StoredJob>>,
}

impl MemoryJobQueue {
    pub fn new(name: &str, visibility_timeout_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            visibility_timeout_secs,
            jobs: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of jobs not yet deleted, visible or not.
    pub fn len(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every job not yet deleted, oldest first.
    pub fn snapshot(&self) -> Vec<PendingJob> {
        self.jobs
            .lock()
            .map(|jobs| {
                jobs.iter()
                    .map(|(id, job)| PendingJob {
                        id: id.clone(),
                        payload: job.payload.clone(),
                        visible_at: job.visible_at,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for MemoryJobQueue {
    fn default() -> Self {
        Self::new("memory", 30)
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn post_job(&self, payload: Value, delay_seconds: u64) -> Result<JobId, RepoError> {
        let id = JobId::generate();
        let job = StoredJob {
            payload,
            visible_at: visible_after(Utc::now(), delay_seconds),
        };
        lock(&self.jobs)?.insert(id.clone(), job);
        Ok(id)
    }

    async fn get_job(&self) -> Result<Option<QueuedJob>, RepoError> {
        let now = Utc::now();
        let mut jobs = lock(&self.jobs)?;
        let claimed = jobs
            .iter_mut()
            .find(|(_, job)| job.visible_at <= now)
            .map(|(id, job)| {
                job.visible_at = visible_after(now, self.visibility_timeout_secs);
                QueuedJob {
                    id: id.clone(),
                    payload: job.payload.clone(),
                }
            });
        Ok(claimed)
    }

    async fn delete(&self, job_id: &JobId) -> Result<(), RepoError> {
        lock(&self.jobs)?.remove(job_id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySubscriptionIndex {
    entries: Mutex<BTreeMap<String, Subscription>>,
}

impl MemorySubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubscriptionIndex for MemorySubscriptionIndex {
    async fn subscribe_by_pattern(
        &self,
        pattern: &Pattern,
        callback_url: &str,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), RepoError> {
        let subscription = Subscription {
            topic_pattern: pattern.as_str().to_string(),
            callback_url: callback_url.to_string(),
            expiry,
        };
        lock(&self.entries)?.insert(pattern.to_key(callback_url).to_string(), subscription);
        Ok(())
    }

    async fn get_subscriptions_by_pattern(
        &self,
        pattern: &Pattern,
    ) -> Result<Vec<Subscription>, RepoError> {
        let entries = lock(&self.entries)?;
        let mut found = Vec::new();
        for layer in pattern.layers() {
            let prefix = Pattern::layer_prefix(&layer);
            found.extend(
                entries
                    .range(prefix.clone()..)
                    .take_while(|(key, _)| key.starts_with(&prefix))
                    .map(|(_, sub)| sub.clone()),
            );
        }
        Ok(found)
    }

    async fn bulk_delete(&self, keys: &[SubscriptionKey]) -> Result<(), RepoError> {
        let mut entries = lock(&self.entries)?;
        for key in keys {
            entries.remove(key.as_str());
        }
        Ok(())
    }
}
