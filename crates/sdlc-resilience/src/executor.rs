//! Retry executor guarded by circuit breakers

use crate::backoff::{BackoffPolicy, RetryContext};
use crate::circuit::{Admission, CircuitBreakerRegistry, CircuitSnapshot, CircuitState};
use crate::error::{RetryError, Retryable};
use sdlc_core::{RetryConfig, SharedClock};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters and breaker states for operational tooling
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetryStats {
    /// Calls to `execute`
    pub total_calls: u64,
    /// Calls that returned Ok
    pub successful_calls: u64,
    /// Calls that returned an operation error
    pub failed_calls: u64,
    /// Attempts beyond the first
    pub total_retries: u64,
    /// Calls (or attempts) refused by an open breaker
    pub circuit_rejections: u64,
    /// Breakers currently open
    pub open_circuits: usize,
    /// Every known breaker
    pub circuits: Vec<CircuitSnapshot>,
}

#[derive(Debug, Default)]
struct Counters {
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    total_retries: AtomicU64,
    circuit_rejections: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        for counter in [
            &self.total_calls,
            &self.successful_calls,
            &self.failed_calls,
            &self.total_retries,
            &self.circuit_rejections,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Runs fallible async operations with retries and circuit breaking
#[derive(Debug)]
pub struct RetryExecutor {
    max_retries: u32,
    backoff: BackoffPolicy,
    breakers: CircuitBreakerRegistry,
    counters: Counters,
}

impl RetryExecutor {
    /// Create executor from configuration
    #[must_use]
    pub fn new(config: &RetryConfig, clock: SharedClock) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: BackoffPolicy::from_config(config),
            breakers: CircuitBreakerRegistry::new(
                config.circuit_breaker_threshold,
                config.circuit_timeout(),
                clock,
            ),
            counters: Counters::default(),
        }
    }

    /// Attempts per call (`max_retries + 1`)
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff policy in use
    #[inline]
    #[must_use]
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Breaker registry
    #[inline]
    #[must_use]
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Execute `operation` under `key`
    ///
    /// # Errors
    /// - `RetryError::CircuitOpen` if the key's breaker refuses an attempt
    /// - `RetryError::Operation` with the last error once attempts run out,
    ///   or immediately for a non-retryable error
    pub async fn execute<T, E, F, Fut>(&self, key: &str, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::error::Error + 'static,
    {
        Counters::bump(&self.counters.total_calls);
        let max_attempts = self.max_attempts();
        let mut ctx = RetryContext::new(key);

        loop {
            if let Admission::Rejected { retry_after } = self.breakers.admit(key) {
                Counters::bump(&self.counters.circuit_rejections);
                tracing::debug!(key, attempt = ctx.attempt, ?retry_after, "rejected by open circuit");
                return Err(RetryError::CircuitOpen {
                    key: key.to_string(),
                    retry_after,
                });
            }

            match operation().await {
                Ok(value) => {
                    self.breakers.record_success(key);
                    Counters::bump(&self.counters.successful_calls);
                    if ctx.attempt > 1 {
                        tracing::debug!(key, attempts = ctx.attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let state = self.breakers.record_failure(key);
                    let retryable = err.is_retryable();

                    if !retryable || ctx.attempt >= max_attempts {
                        Counters::bump(&self.counters.failed_calls);
                        tracing::warn!(
                            key,
                            attempts = ctx.attempt,
                            retryable,
                            error = %err,
                            "operation failed"
                        );
                        return Err(RetryError::Operation {
                            key: key.to_string(),
                            attempts: ctx.attempt,
                            source: err,
                        });
                    }

                    if state == CircuitState::Open {
                        Counters::bump(&self.counters.circuit_rejections);
                        tracing::warn!(key, attempts = ctx.attempt, error = %err, "circuit opened mid-call");
                        return Err(RetryError::CircuitOpen {
                            key: key.to_string(),
                            retry_after: self.breakers.timeout(),
                        });
                    }

                    let delay = ctx.advance(&self.backoff);
                    Counters::bump(&self.counters.total_retries);
                    tracing::debug!(key, next_attempt = ctx.attempt, ?delay, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Counters plus breaker snapshots
    #[must_use]
    pub fn stats(&self) -> RetryStats {
        RetryStats {
            total_calls: self.counters.total_calls.load(Ordering::Relaxed),
            successful_calls: self.counters.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.counters.failed_calls.load(Ordering::Relaxed),
            total_retries: self.counters.total_retries.load(Ordering::Relaxed),
            circuit_rejections: self.counters.circuit_rejections.load(Ordering::Relaxed),
            open_circuits: self.breakers.open_count(),
            circuits: self.breakers.snapshots(),
        }
    }

    /// State of one breaker
    #[inline]
    #[must_use]
    pub fn circuit_state(&self, key: &str) -> CircuitState {
        self.breakers.state(key)
    }

    /// Forget one breaker
    pub fn reset_circuit(&self, key: &str) -> bool {
        self.breakers.reset_key(key)
    }

    /// Forget every breaker and zero the counters
    pub fn reset(&self) {
        tracing::info!("resetting retry state");
        self.breakers.reset();
        self.counters.reset();
    }
}
