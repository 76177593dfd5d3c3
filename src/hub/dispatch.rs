use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{JobEnvelope, NotificationJob, OutboxJob, Pattern, Subscription};
use crate::hub::StepOutcome;
use crate::repos::{JobQueue, QueuedJob, SubscriptionIndex};
use crate::utils::error::HubError;
use crate::worker::Step;

/// The fan-out part of the hub.
///
/// Each notification is turned into one outbox job per valid matching
/// subscription, so that callbacks can be delivered and fail independently.
/// The notification is deleted only after every outbox job has been posted;
/// if the worker dies in between, the notification is fanned out again and
/// subscribers may see a duplicate.
pub struct DispatchToSubscribers {
    notifications: Arc<dyn JobQueue>,
    outbox: Arc<dyn JobQueue>,
    subscriptions: Arc<dyn SubscriptionIndex>,
}

impl DispatchToSubscribers {
    pub fn new(
        notifications: Arc<dyn JobQueue>,
        outbox: Arc<dyn JobQueue>,
        subscriptions: Arc<dyn SubscriptionIndex>,
    ) -> Self {
        Self {
            notifications,
            outbox,
            subscriptions,
        }
    }

    pub async fn execute(&self) -> Result<StepOutcome, HubError> {
        let Some(job) = self.notifications.get_job().await? else {
            return Ok(StepOutcome::Idle);
        };
        self.process(job).await?;
        Ok(StepOutcome::Processed)
    }

    async fn process(&self, job: QueuedJob) -> Result<(), HubError> {
        let notification = match NotificationJob::from_payload(job.payload) {
            Ok(notification) => notification,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Dropping malformed notification");
                self.notifications.delete(&job.id).await?;
                return Ok(());
            }
        };
        let topic = match Pattern::new(&notification.topic) {
            Ok(topic) => topic,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Dropping notification with invalid topic");
                self.notifications.delete(&job.id).await?;
                return Ok(());
            }
        };

        let content = serde_json::to_value(&notification.content).map_err(HubError::JobEncoding)?;
        for subscription in self.matching(&topic).await? {
            if !subscription.is_valid() {
                info!(
                    callback_url = %subscription.callback_url,
                    pattern = %subscription.topic_pattern,
                    "Found invalid subscription"
                );
                continue;
            }
            info!(
                callback_url = %subscription.callback_url,
                content_id = %notification.content.id,
                "Will be notifying subscriber"
            );
            let outbox_job = OutboxJob::new(subscription.callback_url, content.clone());
            self.outbox.post_job(outbox_job.to_payload()?, 0).await?;
        }

        self.notifications.delete(&job.id).await?;
        Ok(())
    }

    async fn matching(&self, topic: &Pattern) -> Result<Vec<Subscription>, HubError> {
        let subscribers = self.subscriptions.get_subscriptions_by_pattern(topic).await?;
        if subscribers.is_empty() {
            info!(%topic, "Nobody to notify about the topic");
        } else {
            info!(%topic, count = subscribers.len(), "Topic has subscribers");
        }
        Ok(subscribers)
    }
}

#[async_trait]
impl Step for DispatchToSubscribers {
    fn name(&self) -> &'static str {
        "spreader"
    }

    async fn execute(&self) -> Result<StepOutcome, HubError> {
        DispatchToSubscribers::execute(self).await
    }
}
