//! Exponential backoff for re-login attempts

use std::time::Duration;

/// Lower bound for any retry delay
const MIN_DELAY: Duration = Duration::from_millis(100);

/// Backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

/// Delay sequence: `initial, initial*m, initial*m^2, ...` capped at `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        let next = first_delay(&policy);
        Self { policy, next }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        let multiplier = self.policy.multiplier.max(1.0);
        let grown = Duration::try_from_secs_f64(self.next.as_secs_f64() * multiplier)
            .unwrap_or(self.policy.max);
        self.next = grown.min(self.policy.max).max(MIN_DELAY);
        delay
    }

    pub fn reset(&mut self) {
        self.next = first_delay(&self.policy);
    }
}

fn first_delay(policy: &BackoffPolicy) -> Duration {
    policy.initial.min(policy.max).max(MIN_DELAY)
}
