//! SDLC Resilience - retries and circuit breaking for unreliable upstreams
//!
//! [`RetryExecutor::execute`] runs an async operation under an operation key:
//! - the key's circuit breaker is consulted before every attempt
//! - failures are retried with capped exponential backoff plus jitter
//! - each key has its own breaker, so one failing topic never blocks others
//!
//! # Example
//!
//! ```rust,ignore
//! use sdlc_resilience::RetryExecutor;
//!
//! let executor = RetryExecutor::new(&config.retry, clock);
//! let docs = executor
//!     .execute("documentation:rust", || broker.get_documentation("rust"))
//!     .await?;
//! ```

#![warn(unreachable_pub)]

pub mod backoff;
pub mod circuit;
pub mod error;
pub mod executor;

pub use backoff::{BackoffPolicy, RetryContext};
pub use circuit::{
    allowed_transitions, validate_transition, Admission, CircuitBreakerRegistry, CircuitSnapshot,
    CircuitState,
};
pub use error::{CircuitError, RetryError, Retryable};
pub use executor::{RetryExecutor, RetryStats};
