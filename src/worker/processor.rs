use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use super::Step;
use crate::hub::StepOutcome;

/// Polling loop around a single `Step`.
///
/// - `Processed`: poll again straight away.
/// - `Idle`: sleep `poll_interval` first.
/// - error: logged and treated as idle. Whatever job was popped becomes
///   visible again once its visibility window lapses.
///
/// Shutdown is only observed between iterations and while sleeping, so an
/// in-flight HTTP call always runs to completion.
pub struct Processor<S> {
    step: S,
    poll_interval: Duration,
}

impl<S: Step> Processor<S> {
    pub fn new(step: S, poll_interval: Duration) -> Self {
        Self {
            step,
            poll_interval,
        }
    }

    pub fn step(&self) -> &S {
        &self.step
    }

    /// Runs one iteration and reports what happened.
    pub async fn tick(&self) -> StepOutcome {
        match self.step.execute().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(processor = self.step.name(), error = %e, "Processor iteration failed");
                StepOutcome::Idle
            }
        }
    }

    /// Loops until `shutdown` carries `true` (or its sender is dropped).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(processor = self.step.name(), "Starting processor");

        while !*shutdown.borrow() {
            if self.tick().await == StepOutcome::Processed {
                continue;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(processor = self.step.name(), "Processor stopped");
    }
}
