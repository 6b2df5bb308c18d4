//! Per-operation circuit breakers
//!
//! Transition table:
//!
//! | from      | to        | when                                   |
//! |-----------|-----------|----------------------------------------|
//! | Closed    | Open      | failure count reaches the threshold    |
//! | Open      | HalfOpen  | cooldown elapsed, next caller probes   |
//! | HalfOpen  | Closed    | the probe succeeds                     |
//! | HalfOpen  | Open      | the probe fails                        |
//!
//! Half-open admits a single probe; everyone else is rejected until the
//! probe reports back (or its slot goes stale after another cooldown).

use crate::error::CircuitError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sdlc_core::{elapsed_since, SharedClock};
use serde::Serialize;
use std::time::Duration;

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow
    Closed,
    /// Calls rejected
    Open,
    /// One probe call allowed
    HalfOpen,
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: CircuitState) -> &'static [CircuitState] {
    use CircuitState::*;
    match from {
        Closed => &[Open],
        Open => &[HalfOpen],
        HalfOpen => &[Closed, Open],
    }
}

/// Validate a transition against the table
pub fn validate_transition(from: CircuitState, to: CircuitState) -> Result<(), CircuitError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(CircuitError::IllegalTransition { from, to })
    }
}

/// Decision for a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed; call normally
    Admitted,
    /// Circuit half-open; this caller is the probe
    Probe,
    /// Circuit open (or probe in flight)
    Rejected {
        /// Remaining cooldown
        retry_after: Duration,
    },
}

impl Admission {
    /// Whether the caller may invoke the operation
    #[inline]
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Read-only view of one breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    /// Operation key
    pub key: String,
    /// State
    pub state: CircuitState,
    /// Consecutive failures
    pub failure_count: u32,
    /// Last failure time
    pub last_failure: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct CircuitRecord {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<DateTime<Utc>>,
    probe_started: Option<DateTime<Utc>>,
}

impl CircuitRecord {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            probe_started: None,
        }
    }

    fn transition(&mut self, key: &str, to: CircuitState) {
        if let Err(err) = validate_transition(self.state, to) {
            if cfg!(feature = "strict-debug") {
                panic!("{err}");
            }
            tracing::error!(key, %err, "ignored illegal circuit transition");
            return;
        }
        tracing::debug!(key, from = ?self.state, ?to, "circuit transition");
        self.state = to;
    }
}

/// Breakers keyed by operation key
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    circuits: DashMap<String, CircuitRecord>,
    threshold: u32,
    timeout: Duration,
    clock: SharedClock,
}

impl CircuitBreakerRegistry {
    /// Create registry
    #[must_use]
    pub fn new(threshold: u32, timeout: Duration, clock: SharedClock) -> Self {
        Self {
            circuits: DashMap::new(),
            threshold: threshold.max(1),
            timeout,
            clock,
        }
    }

    /// Failure threshold
    #[inline]
    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Cooldown
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Decide whether a caller may invoke the operation for `key`
    pub fn admit(&self, key: &str) -> Admission {
        let now = self.clock.now();
        let mut record = self
            .circuits
            .entry(key.to_string())
            .or_insert_with(CircuitRecord::new);

        match record.state {
            CircuitState::Closed => Admission::Admitted,
            CircuitState::Open => {
                let elapsed = record
                    .last_failure
                    .map_or(self.timeout, |t| elapsed_since(self.clock.as_ref(), t));
                if elapsed < self.timeout {
                    return Admission::Rejected {
                        retry_after: self.timeout - elapsed,
                    };
                }
                record.transition(key, CircuitState::HalfOpen);
                record.probe_started = Some(now);
                tracing::info!(key, "circuit half-open, admitting probe");
                Admission::Probe
            }
            CircuitState::HalfOpen => match record.probe_started {
                Some(started) if elapsed_since(self.clock.as_ref(), started) < self.timeout => {
                    Admission::Rejected {
                        retry_after: self.timeout - elapsed_since(self.clock.as_ref(), started),
                    }
                }
                // probe slot free or abandoned
                _ => {
                    record.probe_started = Some(now);
                    Admission::Probe
                }
            },
        }
    }

    /// Record a successful call
    pub fn record_success(&self, key: &str) {
        let mut record = self
            .circuits
            .entry(key.to_string())
            .or_insert_with(CircuitRecord::new);

        match record.state {
            CircuitState::Closed => record.failure_count = 0,
            CircuitState::HalfOpen => {
                record.transition(key, CircuitState::Closed);
                record.failure_count = 0;
                record.probe_started = None;
                tracing::info!(key, "circuit closed after successful probe");
            }
            // a call admitted before the circuit opened; the probe decides
            CircuitState::Open => {}
        }
    }

    /// Record a failed call, returning the resulting state
    pub fn record_failure(&self, key: &str) -> CircuitState {
        let now = self.clock.now();
        let mut record = self
            .circuits
            .entry(key.to_string())
            .or_insert_with(CircuitRecord::new);

        record.failure_count = record.failure_count.saturating_add(1);
        record.last_failure = Some(now);

        match record.state {
            CircuitState::Closed if record.failure_count >= self.threshold => {
                record.transition(key, CircuitState::Open);
                tracing::warn!(
                    key,
                    failures = record.failure_count,
                    "circuit opened after consecutive failures"
                );
            }
            CircuitState::HalfOpen => {
                record.transition(key, CircuitState::Open);
                record.probe_started = None;
                tracing::warn!(key, "probe failed, circuit re-opened");
            }
            _ => {}
        }
        record.state
    }

    /// Current state (closed for unknown keys)
    #[must_use]
    pub fn state(&self, key: &str) -> CircuitState {
        self.circuits
            .get(key)
            .map_or(CircuitState::Closed, |r| r.state)
    }

    /// Snapshot of one breaker
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Option<CircuitSnapshot> {
        self.circuits.get(key).map(|r| CircuitSnapshot {
            key: key.to_string(),
            state: r.state,
            failure_count: r.failure_count,
            last_failure: r.last_failure,
        })
    }

    /// Snapshots of every breaker, sorted by key
    #[must_use]
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut out: Vec<CircuitSnapshot> = self
            .circuits
            .iter()
            .map(|entry| CircuitSnapshot {
                key: entry.key().clone(),
                state: entry.state,
                failure_count: entry.failure_count,
                last_failure: entry.last_failure,
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    /// Count of open breakers
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.circuits
            .iter()
            .filter(|r| r.state == CircuitState::Open)
            .count()
    }

    /// Forget one breaker
    pub fn reset_key(&self, key: &str) -> bool {
        self.circuits.remove(key).is_some()
    }

    /// Forget every breaker
    pub fn reset(&self) {
        self.circuits.clear();
    }
}
