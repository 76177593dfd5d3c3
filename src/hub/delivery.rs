use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::LINK;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{JobEnvelope, OutboxJob};
use crate::hub::{RetryPolicy, StepOutcome};
use crate::repos::{JobQueue, QueuedJob};
use crate::utils::error::{HubError, InvalidCallbackResponse};
use crate::worker::Step;

/// Delivers outbox jobs to subscriber callbacks.
///
/// A failed delivery is re-enqueued as a fresh job with the next attempt
/// number until the retry budget is spent; the original job is removed either
/// way. Once the budget is spent the subscriber simply misses the
/// notification.
pub struct DeliverCallback {
    outbox: Arc<dyn JobQueue>,
    http: reqwest::Client,
    hub_url: String,
    policy: RetryPolicy,
}

impl DeliverCallback {
    pub fn new(
        outbox: Arc<dyn JobQueue>,
        http: reqwest::Client,
        hub_url: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            outbox,
            http,
            hub_url: hub_url.into(),
            policy,
        }
    }

    pub async fn execute(&self) -> Result<StepOutcome, HubError> {
        let Some(job) = self.outbox.get_job().await? else {
            return Ok(StepOutcome::Idle);
        };
        self.process(job).await?;
        Ok(StepOutcome::Processed)
    }

    async fn process(&self, job: QueuedJob) -> Result<(), HubError> {
        let delivery = match OutboxJob::from_payload(job.payload) {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Dropping malformed delivery job");
                self.outbox.delete(&job.id).await?;
                return Ok(());
            }
        };

        debug!(
            job_id = %job.id,
            callback_url = %delivery.callback_url,
            attempt = delivery.retry,
            "Deliver notification"
        );

        if let Err(e) = self
            .deliver_notification(&delivery.callback_url, &delivery.payload)
            .await
        {
            info!(job_id = %job.id, error = %e, "Delivery failed");
            if self.policy.should_retry(delivery.retry) {
                let delay = self.policy.delay_for(delivery.retry);
                self.outbox
                    .post_job(delivery.next_attempt().to_payload()?, delay)
                    .await?;
                info!(job_id = %job.id, delay_seconds = delay, "Re-scheduled delivery");
            } else {
                warn!(
                    callback_url = %delivery.callback_url,
                    attempts = delivery.retry,
                    "Giving up on delivery after exhausting retries"
                );
            }
        }

        self.outbox.delete(&job.id).await?;
        Ok(())
    }

    /// POSTs `payload` to a subscriber callback, advertising this hub in a
    /// `Link` header. Any 2xx counts as accepted.
    pub async fn deliver_notification(
        &self,
        url: &str,
        payload: &Value,
    ) -> Result<(), InvalidCallbackResponse> {
        info!(callback_url = %url, "Sending WebSub payload");
        let response = self
            .http
            .post(url)
            .header(LINK, format!("<{}>; rel=\"hub\"", self.hub_url))
            .json(payload)
            .send()
            .await
            .map_err(|source| InvalidCallbackResponse::Connection {
                url: url.to_string(),
                source,
            })?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(InvalidCallbackResponse::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        })
    }
}

#[async_trait]
impl Step for DeliverCallback {
    fn name(&self) -> &'static str {
        "deliverer"
    }

    async fn execute(&self) -> Result<StepOutcome, HubError> {
        DeliverCallback::execute(self).await
    }
}
