//! Bounded readiness polling with exponential backoff.

use std::time::{Duration, Instant};
use tracing::debug;

/// Backoff schedule for readiness checks.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the first re-check.
    pub initial_delay_ms: u64,
    /// Maximum delay between checks.
    pub max_delay_ms: u64,
    /// Multiplier applied to each subsequent delay.
    pub backoff_multiplier: f64,
    /// Number of re-checks after the initial one.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 4_000,
            backoff_multiplier: 1.5,
            max_attempts: 6,
        }
    }
}

impl PollConfig {
    /// Delay before re-check number `attempt` (zero-based), capped at
    /// `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_delay_ms as f64
            * self.backoff_multiplier.powi(attempt as i32)) as u64;
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    /// Sum of all delays; the longest a poll can take, ignoring check time.
    pub fn total_budget(&self) -> Duration {
        (0..self.max_attempts).map(|a| self.delay_for(a)).sum()
    }
}

/// Result of a readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Ready { attempts: u32, elapsed: Duration },
    TimedOut { attempts: u32, elapsed: Duration },
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Check `ready` immediately, then re-check after each backoff delay until
/// it returns `true` or the attempt budget runs out.
///
/// `attempts` in the outcome counts every call to `ready`.
pub async fn wait_until<F>(config: &PollConfig, mut ready: F) -> PollOutcome
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    if ready() {
        return PollOutcome::Ready {
            attempts: 1,
            elapsed: start.elapsed(),
        };
    }

    for attempt in 0..config.max_attempts {
        let delay = config.delay_for(attempt);
        debug!(
            "Readiness check {}/{} in {}ms",
            attempt + 1,
            config.max_attempts,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
        if ready() {
            return PollOutcome::Ready {
                attempts: attempt + 2,
                elapsed: start.elapsed(),
            };
        }
    }

    PollOutcome::TimedOut {
        attempts: config.max_attempts + 1,
        elapsed: start.elapsed(),
    }
}
