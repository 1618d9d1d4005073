//! Backoff strategies for flush retries

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay grows between attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed,

    /// delay = initial_delay * attempt
    Linear,

    /// delay = initial_delay * base^(attempt-1)
    Exponential {
        /// Growth factor, 2.0 doubles the delay each attempt
        base: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential { base: 2.0 }
    }
}

/// Computes the delay to wait after a failed attempt
#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    strategy: BackoffStrategy,
    initial_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl BackoffCalculator {
    pub fn new(strategy: BackoffStrategy, initial_delay: Duration, max_delay: Duration, jitter: bool) -> Self {
        Self {
            strategy,
            initial_delay,
            max_delay,
            jitter,
        }
    }

    /// Delay after failed attempt number `attempt` (1-indexed), capped at `max_delay`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = self.uncapped_delay(attempt).min(self.max_delay);
        if self.jitter {
            jittered(delay).min(self.max_delay)
        } else {
            delay
        }
    }

    fn uncapped_delay(&self, attempt: u32) -> Duration {
        match self.strategy {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Linear => self.initial_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential { base } => {
                let factor = base.max(1.0).powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32);
                let nanos = self.initial_delay.as_nanos() as f64 * factor;
                if !nanos.is_finite() || nanos >= u64::MAX as f64 {
                    self.max_delay
                } else {
                    Duration::from_nanos(nanos as u64)
                }
            }
        }
    }
}

// +/-20% so that retries from concurrent flushers spread out
fn jittered(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..1.2);
    Duration::from_nanos((delay.as_nanos() as f64 * factor) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator(strategy: BackoffStrategy, max: Duration) -> BackoffCalculator {
        BackoffCalculator::new(strategy, Duration::from_millis(100), max, false)
    }

    #[test]
    fn test_fixed_backoff() {
        let calc = calculator(BackoffStrategy::Fixed, Duration::from_secs(1));
        assert_eq!(calc.delay_after(1), Duration::from_millis(100));
        assert_eq!(calc.delay_after(7), Duration::from_millis(100));
    }

    #[test]
    fn test_linear_backoff_capped() {
        let calc = calculator(BackoffStrategy::Linear, Duration::from_secs(1));
        assert_eq!(calc.delay_after(3), Duration::from_millis(300));
        assert_eq!(calc.delay_after(20), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_backoff() {
        let calc = calculator(BackoffStrategy::Exponential { base: 2.0 }, Duration::from_millis(500));
        assert_eq!(calc.delay_after(1), Duration::from_millis(100));
        assert_eq!(calc.delay_after(2), Duration::from_millis(200));
        assert_eq!(calc.delay_after(3), Duration::from_millis(400));
        assert_eq!(calc.delay_after(4), Duration::from_millis(500));
        assert_eq!(calc.delay_after(200), Duration::from_millis(500));
    }

    #[test]
    fn test_attempt_zero_has_no_delay() {
        let calc = calculator(BackoffStrategy::Fixed, Duration::from_secs(1));
        assert_eq!(calc.delay_after(0), Duration::ZERO);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let calc = BackoffCalculator::new(
            BackoffStrategy::Fixed,
            Duration::from_millis(1000),
            Duration::from_secs(10),
            true,
        );
        for _ in 0..50 {
            let delay = calc.delay_after(1);
            assert!(delay >= Duration::from_millis(800));
            assert!(delay <= Duration::from_millis(1200));
        }
    }
}
