//! Error types for the retry executor

use std::time::Duration;

/// Errors produced by [`crate::RetryExecutor::execute`]
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Breaker for the key is open; the operation was not invoked
    #[error("circuit open for `{key}` (retry after {retry_after:?})")]
    CircuitOpen {
        /// Operation key
        key: String,
        /// Remaining cooldown
        retry_after: Duration,
    },

    /// The operation failed and no attempts remain (or it was not retryable)
    #[error("`{key}` failed after {attempts} attempt(s): {source}")]
    Operation {
        /// Operation key
        key: String,
        /// Attempts made
        attempts: u32,
        /// Last error
        #[source]
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Whether the breaker rejected the call
    #[inline]
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Operation key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::CircuitOpen { key, .. } | Self::Operation { key, .. } => key,
        }
    }

    /// Underlying operation error, when there is one
    #[inline]
    #[must_use]
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation { source, .. } => Some(source),
            Self::CircuitOpen { .. } => None,
        }
    }
}

/// Classifies errors as transient or permanent
pub trait Retryable {
    /// Whether another attempt may succeed
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Circuit state machine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CircuitError {
    /// Transition not in the table
    #[error("illegal circuit transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: crate::circuit::CircuitState,
        /// Requested state
        to: crate::circuit::CircuitState,
    },
}
