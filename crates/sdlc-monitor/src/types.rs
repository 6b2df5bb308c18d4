//! Monitoring state, history and alerts

use chrono::{DateTime, Utc};
use sdlc_core::{QualityCategory, WorkflowId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use ulid::Ulid;

/// Severity of a scorer finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Cosmetic
    Low,
    /// Worth fixing
    Medium,
    /// Fix soon
    High,
    /// Blocks delivery
    Critical,
}

/// A finding reported by a scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    /// Category that produced it
    pub category: QualityCategory,
    /// Severity
    pub severity: IssueSeverity,
    /// Human readable description
    pub message: String,
}

impl QualityIssue {
    /// Create issue
    #[inline]
    #[must_use]
    pub fn new(category: QualityCategory, severity: IssueSeverity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
        }
    }
}

/// Score of one category, 0-100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Category
    pub category: QualityCategory,
    /// Score, clamped to 0-100
    pub score: f64,
    /// Findings behind the score
    pub issues: Vec<QualityIssue>,
}

impl CategoryScore {
    /// Score without findings
    #[must_use]
    pub fn new(category: QualityCategory, score: f64) -> Self {
        Self {
            category,
            score: if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) },
            issues: Vec::new(),
        }
    }

    /// Add a finding
    #[must_use]
    pub fn with_issue(mut self, severity: IssueSeverity, message: impl Into<String>) -> Self {
        self.issues.push(QualityIssue::new(self.category, severity, message));
        self
    }
}

/// One sample in a workflow's quality history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityHistoryEntry {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
    /// Weighted overall score
    pub overall_score: f64,
    /// Per-category scores
    pub category_scores: BTreeMap<QualityCategory, f64>,
    /// Findings in this sample
    pub issues: Vec<QualityIssue>,
    /// Suggestions for the weakest categories at sample time
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Kind of alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Overall score dropped sharply between samples
    Degradation,
    /// A scorer reported a critical finding
    Critical,
    /// Overall score fell below the warning threshold
    Warning,
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational
    Low,
    /// Needs attention
    Medium,
    /// Needs prompt attention
    High,
    /// Needs immediate attention
    Critical,
}

/// Alert raised by a quality check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAlert {
    /// Unique id
    pub id: Ulid,
    /// Workflow the alert belongs to
    pub workflow_id: WorkflowId,
    /// Kind
    pub alert_type: AlertType,
    /// Severity
    pub severity: AlertSeverity,
    /// Summary
    pub message: String,
    /// Structured detail
    pub details: serde_json::Value,
    /// Raise time
    pub timestamp: DateTime<Utc>,
    /// Seen by an operator
    pub acknowledged: bool,
    /// Dealt with
    pub resolved: bool,
}

impl QualityAlert {
    /// New unacknowledged, unresolved alert
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: impl Into<String>,
        details: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            workflow_id,
            alert_type,
            severity,
            message: message.into(),
            details,
            timestamp,
            acknowledged: false,
            resolved: false,
        }
    }
}

/// Direction of recent scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTrend {
    /// Scores rising
    Improving,
    /// Scores flat
    Stable,
    /// Scores falling
    Declining,
    /// Fewer than three samples
    InsufficientData,
}

impl QualityTrend {
    /// Samples considered
    pub const WINDOW: usize = 5;
    /// Net change treated as flat
    pub const TOLERANCE: f64 = 2.0;

    /// Trend over the last [`Self::WINDOW`] scores, oldest first
    #[must_use]
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.len() < 3 {
            return QualityTrend::InsufficientData;
        }
        let window = &scores[scores.len().saturating_sub(Self::WINDOW)..];
        let delta = window[window.len() - 1] - window[0];
        if delta > Self::TOLERANCE {
            QualityTrend::Improving
        } else if delta < -Self::TOLERANCE {
            QualityTrend::Declining
        } else {
            QualityTrend::Stable
        }
    }
}

/// Per-workflow monitoring state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMonitoringState {
    /// Workflow id
    pub workflow_id: WorkflowId,
    /// Periodic checks running
    pub active: bool,
    /// When monitoring started
    pub started_at: DateTime<Utc>,
    /// Last completed check
    pub last_check: Option<DateTime<Utc>>,
    /// Latest overall score
    pub current_score: Option<f64>,
    /// Samples, oldest first
    pub history: VecDeque<QualityHistoryEntry>,
    /// Alerts, oldest first
    pub alerts: VecDeque<QualityAlert>,
}

impl QualityMonitoringState {
    /// Fresh active state
    #[must_use]
    pub fn new(workflow_id: WorkflowId, started_at: DateTime<Utc>) -> Self {
        Self {
            workflow_id,
            active: true,
            started_at,
            last_check: None,
            current_score: None,
            history: VecDeque::new(),
            alerts: VecDeque::new(),
        }
    }

    /// Most recent sample
    #[inline]
    #[must_use]
    pub fn latest(&self) -> Option<&QualityHistoryEntry> {
        self.history.back()
    }

    /// Trend of the recorded history
    #[must_use]
    pub fn trend(&self) -> QualityTrend {
        let scores: Vec<f64> = self.history.iter().map(|e| e.overall_score).collect();
        QualityTrend::from_scores(&scores)
    }

    /// Alerts not yet resolved
    pub fn open_alerts(&self) -> impl Iterator<Item = &QualityAlert> {
        self.alerts.iter().filter(|a| !a.resolved)
    }
}

/// Summary exposed to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    /// Workflow id
    pub workflow_id: WorkflowId,
    /// Periodic checks running
    pub active: bool,
    /// Latest overall score
    pub current_score: Option<f64>,
    /// Latest per-category scores
    pub category_scores: BTreeMap<QualityCategory, f64>,
    /// Recent direction
    pub trend: QualityTrend,
    /// Samples recorded
    pub checks: usize,
    /// Unresolved alerts
    pub open_alerts: usize,
    /// Last completed check
    pub last_check: Option<DateTime<Utc>>,
    /// Suggestions for the weakest categories
    pub recommendations: Vec<String>,
}
