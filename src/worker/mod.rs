//! The `worker` module drives the queue-consuming use cases.
//!
//! Each pipeline stage runs in its own long-lived `Processor`: one job per
//! iteration, a fixed sleep when the queue is idle. Several processors of the
//! same stage may run side by side; the queue's visibility semantics keep them
//! from handling the same job concurrently.

pub mod processor;

use async_trait::async_trait;

use crate::hub::StepOutcome;
use crate::utils::error::HubError;

pub use processor::Processor;

/// A use case that consumes at most one job per call.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self) -> Result<StepOutcome, HubError>;
}
