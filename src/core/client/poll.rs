// src/core/client/poll.rs

use std::time::Duration;

use rand::Rng;

/// How long and how often to ask whether an export is ready.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay after the first non-ready answer.
    pub initial_interval: Duration,
    /// Ceiling for the doubling delay.
    pub max_interval: Duration,
    /// Total time an export may stay non-ready before it is abandoned.
    pub max_wait: Duration,
    /// Each delay is scaled by a random factor in `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(15),
            max_wait: Duration::from_secs(30 * 60),
            jitter: 0.2,
        }
    }
}

impl PollPolicy {
    /// Polls back to back with no waiting. Handy against local fakes.
    pub fn immediate(max_wait: Duration) -> Self {
        Self {
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            max_wait,
            jitter: 0.0,
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial_interval,
            max: self.max_interval.max(self.initial_interval),
            jitter: self.jitter.clamp(0.0, 1.0),
        }
    }
}

/// Exponential delay sequence with jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    jitter: f64,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        let base = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        jittered(base, self.jitter)
    }
}

fn jittered(base: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 || base.is_zero() {
        return base;
    }
    let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
    base.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_up_to_the_ceiling() {
        let policy = PollPolicy {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(60),
            jitter: 0.0,
        };
        let mut backoff = policy.backoff();
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = PollPolicy { jitter: 0.2, ..PollPolicy::default() };
        for _ in 0..100 {
            let delay = policy.backoff().next_delay();
            assert!(delay >= Duration::from_millis(790) && delay <= Duration::from_millis(1210), "{delay:?}");
        }
    }

    #[test]
    fn immediate_policy_never_sleeps() {
        let mut backoff = PollPolicy::immediate(Duration::from_secs(1)).backoff();
        assert!(backoff.next_delay().is_zero());
        assert!(backoff.next_delay().is_zero());
    }
}
