//! Hub use cases
//!
//! This module contains the reliable delivery and fan-out pipeline:
//! - relay: persist an outgoing message and push it to the foreign endpoint
//!   with bounded retries
//! - publish / dispatch / delivery: announce a newly arrived message, fan it
//!   out to every matching subscriber and POST it to each callback
//! - subscriptions: the WebSub intent-verification handshake that guards the
//!   subscription index
//!
//! Every use case receives its collaborators at construction time. Worker-side
//! use cases pop at most one job per `execute` call and report whether there
//! was anything to do; scheduling is left to `crate::worker::Processor`.
//!
//! Nothing here spans a dequeue, a store write and an enqueue atomically.
//! Each step commits on its own, so a crash between steps can only ever cause
//! a job to be processed again, never lost.

pub mod delivery;
pub mod dispatch;
pub mod publish;
pub mod relay;
pub mod retry;
pub mod subscriptions;

pub use delivery::DeliverCallback;
pub use dispatch::DispatchToSubscribers;
pub use publish::PublishNewMessage;
pub use relay::{ProcessMessage, ReceiveMessage, SendToForeign};
pub use retry::RetryPolicy;
pub use subscriptions::{IntentVerifier, SubscriptionLifecycle};

/// Result of a single worker-side `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The queue had nothing eligible; the caller should back off.
    Idle,
    /// One job was taken off the queue and handled.
    Processed,
}
