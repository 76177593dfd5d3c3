use rand::Rng;

/// Exponential backoff with jitter, shared by the relay and callback workers.
///
/// For a 1-based `attempt` the ceiling is `min(base * 2^attempt, max_delay)`;
/// the scheduled delay is half the ceiling plus a uniform random share of the
/// other half, truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_secs: u64,
    pub max_delay_secs: u64,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const BASE_SECS: u64 = 8;
    pub const MAX_DELAY_SECS: u64 = 100;
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Whether a job that just failed on `attempt` gets another one.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn ceiling(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        self.base_secs
            .saturating_mul(factor)
            .min(self.max_delay_secs)
    }

    pub fn delay_for(&self, attempt: u32) -> u64 {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> u64 {
        let half = self.ceiling(attempt) as f64 / 2.0;
        let jitter = rng.gen_range(0.0..=half);
        (half + jitter) as u64
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_secs: Self::BASE_SECS,
            max_delay_secs: Self::MAX_DELAY_SECS,
            max_attempts: Self::MAX_ATTEMPTS,
        }
    }
}
