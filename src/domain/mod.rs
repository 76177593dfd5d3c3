//! The `domain` module holds the data model that flows through the hub:
//! messages in transit, the job envelopes carried by the queues, topic
//! patterns and subscriptions.

pub mod job;
pub mod message;
pub mod pattern;
pub mod subscription;

pub use job::{JobEnvelope, NotificationContent, NotificationJob, OutboxJob, RelayJob};
pub use message::{Message, MessageStatus};
pub use pattern::{Pattern, SubscriptionKey};
pub use subscription::{HubMode, Subscription};

#[cfg(test)]
mod tests;
