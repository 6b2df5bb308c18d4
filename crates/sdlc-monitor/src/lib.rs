//! SDLC Monitor - quality tracking for running workflows
//!
//! While a workflow runs, the [`QualityMonitor`] periodically scores the
//! latest [`QualitySnapshot`] published for it:
//! - pluggable [`QualityScorer`]s produce one score per category
//! - [`evaluate_check`] turns a sample into a history entry and alerts
//! - degradation, critical-issue and warning alerts accumulate per workflow
//!
//! The check itself is pure; the monitor only schedules it and applies the
//! outcome to shared state.

#![warn(unreachable_pub)]

pub mod check;
pub mod error;
pub mod monitor;
pub mod scorer;
pub mod types;

pub use check::{apply_outcome, evaluate_check, overall_score, recommendations, CheckOutcome, RECOMMENDATION_THRESHOLD};
pub use error::MonitorError;
pub use monitor::QualityMonitor;
pub use scorer::{
    default_scorers, PhaseMetricsScorer, QualityScorer, QualitySnapshot, SnapshotBoard,
    NEUTRAL_SCORE, PHASE_TIME_BUDGET_MS,
};
pub use types::{
    AlertSeverity, AlertType, CategoryScore, IssueSeverity, QualityAlert, QualityHistoryEntry,
    QualityIssue, QualityMonitoringState, QualityReport, QualityTrend,
};
