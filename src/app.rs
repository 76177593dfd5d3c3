//! Wiring of collaborators into use cases.
//!
//! `App` is built once at startup from `Settings`; every use case it hands
//! out receives already-constructed store, queue and HTTP client handles.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::hub::{
    DeliverCallback, DispatchToSubscribers, IntentVerifier, ProcessMessage, PublishNewMessage,
    ReceiveMessage, SendToForeign, SubscriptionLifecycle,
};
use crate::repos::{
    DELIVERY_OUTBOX_QUEUE, JobQueue, MemoryJobQueue, MemoryMessageStore, MemorySubscriptionIndex,
    MessageStore, NOTIFICATIONS_QUEUE, RELAY_QUEUE, SledStore, SubscriptionIndex,
};
use crate::utils::error::HubError;

#[derive(Clone)]
pub struct App {
    pub settings: Settings,
    pub messages: Arc<dyn MessageStore>,
    pub relay_queue: Arc<dyn JobQueue>,
    pub notifications: Arc<dyn JobQueue>,
    pub outbox: Arc<dyn JobQueue>,
    pub subscriptions: Arc<dyn SubscriptionIndex>,
    pub http: reqwest::Client,
}

impl App {
    /// Opens the configured stores: the sled database at `storage.path`, or
    /// process memory when `storage.in_memory` is set.
    pub fn from_settings(settings: Settings) -> Result<Self, HubError> {
        if settings.storage.in_memory {
            return Self::in_memory(settings);
        }

        let store = SledStore::open(&settings.storage.path)?;
        let visibility = settings.worker.visibility_timeout_secs;
        Ok(Self {
            messages: Arc::new(store.messages()?),
            relay_queue: Arc::new(store.queue(RELAY_QUEUE, visibility)?),
            notifications: Arc::new(store.queue(NOTIFICATIONS_QUEUE, visibility)?),
            outbox: Arc::new(store.queue(DELIVERY_OUTBOX_QUEUE, visibility)?),
            subscriptions: Arc::new(store.subscriptions()?),
            http: http_client(&settings)?,
            settings,
        })
    }

    pub fn in_memory(settings: Settings) -> Result<Self, HubError> {
        let visibility = settings.worker.visibility_timeout_secs;
        Ok(Self {
            messages: Arc::new(MemoryMessageStore::new()),
            relay_queue: Arc::new(MemoryJobQueue::new(RELAY_QUEUE, visibility)),
            notifications: Arc::new(MemoryJobQueue::new(NOTIFICATIONS_QUEUE, visibility)),
            outbox: Arc::new(MemoryJobQueue::new(DELIVERY_OUTBOX_QUEUE, visibility)),
            subscriptions: Arc::new(MemorySubscriptionIndex::new()),
            http: http_client(&settings)?,
            settings,
        })
    }

    /// Processors to start for each pipeline stage.
    pub fn workers_per_stage(&self) -> usize {
        self.settings.worker.concurrency.max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.worker.poll_interval_ms)
    }

    pub fn receive_message(&self) -> ReceiveMessage {
        ReceiveMessage::new(self.messages.clone(), self.relay_queue.clone())
    }

    pub fn process_message(&self) -> ProcessMessage {
        ProcessMessage::new(
            self.messages.clone(),
            self.relay_queue.clone(),
            SendToForeign::new(
                self.http.clone(),
                self.settings.service.foreign_endpoint_url.clone(),
            ),
            self.settings.retry_policy(),
        )
    }

    pub fn publish_new_message(&self) -> PublishNewMessage {
        PublishNewMessage::new(self.notifications.clone())
    }

    pub fn dispatch_to_subscribers(&self) -> DispatchToSubscribers {
        DispatchToSubscribers::new(
            self.notifications.clone(),
            self.outbox.clone(),
            self.subscriptions.clone(),
        )
    }

    pub fn deliver_callback(&self) -> DeliverCallback {
        DeliverCallback::new(
            self.outbox.clone(),
            self.http.clone(),
            self.settings.hub_url(),
            self.settings.retry_policy(),
        )
    }

    pub fn subscription_lifecycle(&self) -> SubscriptionLifecycle {
        SubscriptionLifecycle::new(
            self.subscriptions.clone(),
            IntentVerifier::new(self.http.clone()),
        )
    }
}

fn http_client(settings: &Settings) -> Result<reqwest::Client, HubError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.http.timeout_secs))
        .user_agent(concat!("channelhub/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(HubError::HttpClient)
}
