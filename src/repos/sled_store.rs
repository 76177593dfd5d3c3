//! Persistence layer backed by `sled`
//!
//! One `sled::Db` holds every store: messages live in the `messages` tree,
//! subscriptions in the `subscriptions` tree and each job queue in a tree
//! named after the queue. Values are JSON documents.
//!
//! Job keys are prefixed with the enqueue timestamp so iteration yields the
//! oldest jobs first. A consumer claims a job by swapping in a record with a
//! later `visible_at`; the compare-and-swap guarantees that two consumers
//! never claim the same job inside one visibility window.
//!
//! Writes are left to sled's background flush.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sled::{Batch, Db, Tree};
use tracing::warn;
use uuid::Uuid;

use super::{
    JobId, JobQueue, MessageStore, QueuedJob, StoredJob, SubscriptionIndex, visible_after,
};
use crate::domain::{Message, Pattern, Subscription, SubscriptionKey};
use crate::utils::error::RepoError;

const MESSAGES_TREE: &str = "messages";
const SUBSCRIPTIONS_TREE: &str = "subscriptions";

/// Handle to the embedded database, used to open the individual stores.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str) -> Result<Self, RepoError> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    pub fn messages(&self) -> Result<SledMessageStore, RepoError> {
        Ok(SledMessageStore {
            tree: self.db.open_tree(MESSAGES_TREE)?,
        })
    }

    pub fn queue(
        &self,
        name: &str,
        visibility_timeout_secs: u64,
    ) -> Result<SledJobQueue, RepoError> {
        Ok(SledJobQueue {
            tree: self.db.open_tree(format!("queue/{name}"))?,
            visibility_timeout_secs,
        })
    }

    pub fn subscriptions(&self) -> Result<SledSubscriptionIndex, RepoError> {
        Ok(SledSubscriptionIndex {
            tree: self.db.open_tree(SUBSCRIPTIONS_TREE)?,
        })
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .finish()
    }
}

pub struct SledMessageStore {
    tree: Tree,
}

#[async_trait]
impl MessageStore for SledMessageStore {
    async fn save_message(&self, mut message: Message) -> Result<Message, RepoError> {
        let id = message.ensure_id();
        let body = serde_json::to_vec(&message)?;
        self.tree.insert(id.to_string().as_bytes(), body)?;
        Ok(message)
    }

    async fn get_message(&self, id: &Uuid) -> Result<Option<Message>, RepoError> {
        match self.tree.get(id.to_string().as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => {
                warn!(message_id = %id, "Message not found");
                Ok(None)
            }
        }
    }
}

pub struct SledJobQueue {
    tree: Tree,
    visibility_timeout_secs: u64,
}

impl SledJobQueue {
    /// Number of jobs not yet deleted, visible or not.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[async_trait]
impl JobQueue for SledJobQueue {
    async fn post_job(&self, payload: Value, delay_seconds: u64) -> Result<JobId, RepoError> {
        let id = JobId::generate();
        let job = StoredJob {
            payload,
            visible_at: visible_after(Utc::now(), delay_seconds),
        };
        self.tree
            .insert(id.as_str().as_bytes(), serde_json::to_vec(&job)?)?;
        Ok(id)
    }

    async fn get_job(&self) -> Result<Option<QueuedJob>, RepoError> {
        let now = Utc::now();

        for entry in self.tree.iter() {
            let (key, raw) = entry?;
            let mut job: StoredJob = match serde_json::from_slice(&raw) {
                Ok(job) => job,
                Err(e) => {
                    warn!(key = %String::from_utf8_lossy(&key), error = %e, "Skipping unreadable job record");
                    continue;
                }
            };
            if job.visible_at > now {
                continue;
            }

            job.visible_at = visible_after(now, self.visibility_timeout_secs);
            let claimed = serde_json::to_vec(&job)?;

            // Another consumer claimed or deleted it first.
            if self
                .tree
                .compare_and_swap(&key, Some(&raw), Some(claimed))?
                .is_err()
            {
                continue;
            }

            return Ok(Some(QueuedJob {
                id: JobId::from_raw(String::from_utf8_lossy(&key).into_owned()),
                payload: job.payload,
            }));
        }

        Ok(None)
    }

    async fn delete(&self, job_id: &JobId) -> Result<(), RepoError> {
        self.tree.remove(job_id.as_str().as_bytes())?;
        Ok(())
    }
}

pub struct SledSubscriptionIndex {
    tree: Tree,
}

#[async_trait]
impl SubscriptionIndex for SledSubscriptionIndex {
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
        let key = pattern.to_key(callback_url);
        self.tree
            .insert(key.as_str().as_bytes(), serde_json::to_vec(&subscription)?)?;
        Ok(())
    }

    async fn get_subscriptions_by_pattern(
        &self,
        pattern: &Pattern,
    ) -> Result<Vec<Subscription>, RepoError> {
        let mut found = Vec::new();
        for layer in pattern.layers() {
            for entry in self.tree.scan_prefix(Pattern::layer_prefix(&layer).as_bytes()) {
                let (_, raw) = entry?;
                found.push(serde_json::from_slice(&raw)?);
            }
        }
        Ok(found)
    }

    async fn bulk_delete(&self, keys: &[SubscriptionKey]) -> Result<(), RepoError> {
        let mut batch = Batch::default();
        for key in keys {
            batch.remove(key.as_str().as_bytes());
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }
}
