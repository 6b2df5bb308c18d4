//! Exponential backoff with jitter

use sdlc_core::RetryConfig;
use std::time::Duration;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    jitter_ratio: f64,
}

impl BackoffPolicy {
    /// Create policy
    #[inline]
    #[must_use]
    pub fn new(base: Duration, max: Duration, jitter_ratio: f64) -> Self {
        Self {
            base,
            max,
            jitter_ratio: if jitter_ratio.is_nan() { 0.0 } else { jitter_ratio.clamp(0.0, 1.0) },
        }
    }

    /// Policy from retry configuration
    #[inline]
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay(), config.max_delay(), config.jitter_ratio)
    }

    /// `base * 2^(attempt-1)`, saturating; attempt numbering starts at 1
    #[must_use]
    pub fn exponential(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor)
    }

    /// Delay without jitter, capped at the maximum
    #[inline]
    #[must_use]
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        self.exponential(attempt).min(self.max)
    }

    /// Delay with jitter: `min(max, exp + U[0, ratio] * exp)`
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with_sample(attempt, rand::random::<f64>())
    }

    /// Delay for a given jitter sample in `[0, 1)`
    #[must_use]
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let exp = self.exponential(attempt);
        if exp >= self.max {
            return self.max;
        }
        let jitter = exp.mul_f64(self.jitter_ratio * sample.clamp(0.0, 1.0));
        exp.saturating_add(jitter).min(self.max)
    }

    /// Maximum delay
    #[inline]
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }
}

/// Per-call attempt bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct RetryContext {
    /// Operation key
    pub key: String,
    /// Attempt about to run or just run, starting at 1
    pub attempt: u32,
    /// Delay computed before the next attempt
    pub delay: Duration,
}

impl RetryContext {
    /// Context before the first attempt
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            attempt: 1,
            delay: Duration::ZERO,
        }
    }

    /// Compute the delay after the current attempt and advance the counter
    pub fn advance(&mut self, policy: &BackoffPolicy) -> Duration {
        self.delay = policy.delay_for(self.attempt);
        self.attempt += 1;
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(100), Duration::from_millis(1000), 0.1)
    }

    #[test]
    fn nan_jitter_ratio_means_no_jitter() {
        let p = BackoffPolicy::new(Duration::from_millis(100), Duration::from_millis(1000), f64::NAN);
        assert_eq!(p.delay_with_sample(2, 0.9), Duration::from_millis(200));
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
    }

    #[test]
    fn doubles_per_attempt() {
        let p = policy();
        assert_eq!(p.base_delay_for(1), Duration::from_millis(100));
        assert_eq!(p.base_delay_for(2), Duration::from_millis(200));
        assert_eq!(p.base_delay_for(3), Duration::from_millis(400));
        assert_eq!(p.base_delay_for(4), Duration::from_millis(800));
        assert_eq!(p.base_delay_for(5), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_bounded_by_ratio() {
        let p = policy();
        assert_eq!(p.delay_with_sample(1, 0.0), Duration::from_millis(100));
        assert_eq!(p.delay_with_sample(1, 1.0), Duration::from_millis(110));
        assert_eq!(p.delay_with_sample(4, 1.0), Duration::from_millis(880));
        assert_eq!(p.delay_with_sample(5, 1.0), Duration::from_millis(1000));
    }

    #[test]
    fn huge_attempts_saturate() {
        let p = policy();
        assert_eq!(p.base_delay_for(u32::MAX), p.max());
        assert_eq!(p.delay_for(200), p.max());
    }

    #[test]
    fn context_advances() {
        let p = BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(10), 0.0);
        let mut ctx = RetryContext::new("documentation:rust");
        assert_eq!(ctx.advance(&p), Duration::from_millis(10));
        assert_eq!(ctx.attempt, 2);
        assert_eq!(ctx.delay, Duration::from_millis(10));
    }

    proptest! {
        #[test]
        fn prop_non_decreasing_and_capped(
            base_ms in 1u64..1000,
            max_ms in 1u64..60_000,
            attempt in 1u32..40,
        ) {
            let p = BackoffPolicy::new(
                Duration::from_millis(base_ms),
                Duration::from_millis(max_ms.max(base_ms)),
                0.1,
            );
            prop_assert!(p.base_delay_for(attempt) <= p.base_delay_for(attempt + 1));
            prop_assert!(p.base_delay_for(attempt) <= p.max());
            prop_assert!(p.delay_for(attempt) <= p.max());
        }
    }
}
