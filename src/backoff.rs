//! Reconnection backoff math.

use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff for automatic reconnection.
///
/// Delays start at `initial_delay`, grow by `backoff_factor` per attempt and
/// are capped at `max_delay`. Each delay is spread by ±`randomization_factor`
/// so that many clients do not retry in lockstep.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Number of automatic attempts after a disconnect before giving up.
    pub max_attempts: u32,
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
    /// Jitter fraction in `[0, 1]`. Zero disables jitter.
    pub randomization_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            randomization_factor: 0.5,
        }
    }
}

impl ReconnectConfig {
    /// Delay to wait before the given attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = base.min(self.max_delay.as_secs_f64());

        let factor = self.randomization_factor.clamp(0.0, 1.0);
        let jittered = if factor > 0.0 {
            let offset: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
            capped + capped * factor * offset
        } else {
            capped
        };
        Duration::from_secs_f64(jittered.clamp(0.0, self.max_delay.as_secs_f64()))
    }

    /// Whether `attempt` (1-based) is beyond the configured limit.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reconnection_policy() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_secs(3));
        assert_eq!(config.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn delays_grow_then_cap_without_jitter() {
        let config = ReconnectConfig {
            randomization_factor: 0.0,
            ..ReconnectConfig::default()
        };
        let delays: Vec<u64> = (1..=5)
            .map(|n| config.delay_for_attempt(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![3_000, 6_000, 10_000, 10_000, 10_000]);
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let config = ReconnectConfig::default();
        for attempt in 1..=8 {
            let delay = config.delay_for_attempt(attempt);
            assert!(delay <= config.max_delay, "attempt {attempt}: {delay:?}");
            if attempt == 1 {
                assert!(delay >= Duration::from_millis(1_500), "{delay:?}");
            }
        }
    }

    #[test]
    fn exhaustion_is_after_max_attempts() {
        let config = ReconnectConfig::default();
        assert!(!config.is_exhausted(5));
        assert!(config.is_exhausted(6));
    }
}
