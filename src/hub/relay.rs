//! Relay pipeline: `ReceiveMessage` -> `ProcessMessage` -> `SendToForeign`.
//!
//! Ingestion only persists the message and enqueues a relay job; the HTTP
//! delivery to the foreign endpoint happens later on a relay worker.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::domain::{JobEnvelope, Message, MessageStatus, RelayJob};
use crate::hub::{RetryPolicy, StepOutcome};
use crate::repos::{JobQueue, MessageStore, QueuedJob};
use crate::utils::error::{DeliveryFailure, HubError};
use crate::worker::Step;

pub struct ReceiveMessage {
    messages: Arc<dyn MessageStore>,
    queue: Arc<dyn JobQueue>,
}

impl ReceiveMessage {
    pub fn new(messages: Arc<dyn MessageStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { messages, queue }
    }

    /// Persists `message` and schedules exactly one relay job for it.
    pub async fn receive(&self, mut message: Message) -> Result<Message, HubError> {
        let message_id = message.ensure_id();
        let message = self.messages.save_message(message).await?;
        let job_id = self
            .queue
            .post_job(RelayJob::new(message_id).to_payload()?, 0)
            .await?;
        debug!(%message_id, %job_id, "Enqueued message for relay");
        Ok(message)
    }
}

/// POSTs message payloads to the partner jurisdiction's inbound endpoint.
pub struct SendToForeign {
    http: reqwest::Client,
    endpoint: String,
}

impl SendToForeign {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Marks `message` delivered on a 200 response. Any other status, or no
    /// response at all, leaves it untouched.
    pub async fn send(&self, message: &mut Message) -> Result<(), DeliveryFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&message.payload)
            .send()
            .await
            .map_err(DeliveryFailure::Transport)?;

        let status = response.status();
        if status == StatusCode::OK {
            message.status = MessageStatus::Delivered;
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryFailure::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Pops relay jobs and tries to hand the referenced message to the foreign
/// endpoint, re-enqueueing failed attempts until the retry budget runs out.
///
/// A message whose budget is exhausted stays `Received`; nothing else records
/// the failure.
pub struct ProcessMessage {
    messages: Arc<dyn MessageStore>,
    queue: Arc<dyn JobQueue>,
    sender: SendToForeign,
    policy: RetryPolicy,
}

impl ProcessMessage {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        queue: Arc<dyn JobQueue>,
        sender: SendToForeign,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            messages,
            queue,
            sender,
            policy,
        }
    }

    pub async fn execute(&self) -> Result<StepOutcome, HubError> {
        let Some(job) = self.queue.get_job().await? else {
            return Ok(StepOutcome::Idle);
        };
        self.process(job).await?;
        Ok(StepOutcome::Processed)
    }

    async fn process(&self, job: QueuedJob) -> Result<(), HubError> {
        let relay = match RelayJob::from_payload(job.payload) {
            Ok(relay) => relay,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Dropping malformed relay job");
                self.queue.delete(&job.id).await?;
                return Ok(());
            }
        };
        let message_id = relay.message_id;

        let Some(mut message) = self.messages.get_message(&message_id).await? else {
            warn!(job_id = %job.id, error = %HubError::MessageNotFound(message_id), "Dropping relay job");
            self.queue.delete(&job.id).await?;
            return Ok(());
        };

        info!(
            %message_id,
            attempt = relay.retry,
            status = message.status.as_str(),
            "Processing message"
        );

        if message.is_delivered() {
            debug!(job_id = %job.id, %message_id, "Message already delivered, discarding duplicate job");
            self.queue.delete(&job.id).await?;
            return Ok(());
        }

        match self.sender.send(&mut message).await {
            Ok(()) => {
                self.messages.save_message(message).await?;
                info!(%message_id, "Message delivered to foreign endpoint");
            }
            Err(failure) => {
                info!(job_id = %job.id, %message_id, error = %failure, "Sending message failed");
                if self.policy.should_retry(relay.retry) {
                    let delay = self.policy.delay_for(relay.retry);
                    self.queue
                        .post_job(relay.next_attempt().to_payload()?, delay)
                        .await?;
                    info!(job_id = %job.id, delay_seconds = delay, "Re-scheduled sending message");
                } else {
                    warn!(
                        %message_id,
                        attempts = relay.retry,
                        "Giving up on message after exhausting retries"
                    );
                }
            }
        }

        self.queue.delete(&job.id).await?;
        Ok(())
    }
}

#[async_trait]
impl Step for ProcessMessage {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn execute(&self) -> Result<StepOutcome, HubError> {
        ProcessMessage::execute(self).await
    }
}
