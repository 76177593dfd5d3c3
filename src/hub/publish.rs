use std::sync::Arc;

use tracing::debug;

use crate::domain::{JobEnvelope, NotificationContent, NotificationJob};
use crate::repos::{JobId, JobQueue};
use crate::utils::error::HubError;

/// Announces a newly arrived message on `jurisdiction.<code>`.
///
/// Fire-and-forget: the only failure is the queue's own.
pub struct PublishNewMessage {
    notifications: Arc<dyn JobQueue>,
}

impl PublishNewMessage {
    pub fn new(notifications: Arc<dyn JobQueue>) -> Self {
        Self { notifications }
    }

    pub async fn publish(
        &self,
        jurisdiction: &str,
        content: NotificationContent,
    ) -> Result<JobId, HubError> {
        let job = NotificationJob::for_jurisdiction(jurisdiction, content);
        debug!(topic = %job.topic, content_id = %job.content.id, "Publish notification");
        Ok(self.notifications.post_job(job.to_payload()?, 0).await?)
    }
}
