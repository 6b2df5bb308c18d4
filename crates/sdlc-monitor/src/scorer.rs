//! Quality scorers and the snapshots they read

use crate::error::MonitorError;
use crate::types::{CategoryScore, IssueSeverity};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sdlc_core::{AgentRole, PhaseResult, PhaseStatus, QualityCategory, Workflow, WorkflowId};
use std::sync::Arc;

/// Value copy of a workflow taken after a phase
#[derive(Debug, Clone, PartialEq)]
pub struct QualitySnapshot {
    /// Workflow with phase statuses as of capture
    pub workflow: Workflow,
    /// Results recorded so far
    pub phase_results: Vec<PhaseResult>,
    /// Capture time
    pub captured_at: DateTime<Utc>,
}

impl QualitySnapshot {
    /// Create snapshot
    #[must_use]
    pub fn new(workflow: Workflow, phase_results: Vec<PhaseResult>, captured_at: DateTime<Utc>) -> Self {
        Self {
            workflow,
            phase_results,
            captured_at,
        }
    }

    fn mean_of(&self, f: impl Fn(&PhaseResult) -> f64) -> Option<f64> {
        let executed: Vec<f64> = self
            .phase_results
            .iter()
            .filter(|r| r.success)
            .map(f)
            .collect();
        if executed.is_empty() {
            None
        } else {
            Some(executed.iter().sum::<f64>() / executed.len() as f64)
        }
    }
}

/// Latest snapshot per workflow, shared between publisher and monitor
#[derive(Debug, Clone, Default)]
pub struct SnapshotBoard {
    snapshots: Arc<DashMap<WorkflowId, QualitySnapshot>>,
}

impl SnapshotBoard {
    /// Empty board
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot of a workflow
    pub fn publish(&self, snapshot: QualitySnapshot) {
        self.snapshots.insert(snapshot.workflow.id.clone(), snapshot);
    }

    /// Clone of the latest snapshot
    #[must_use]
    pub fn get(&self, id: &WorkflowId) -> Option<QualitySnapshot> {
        self.snapshots.get(id).map(|s| s.value().clone())
    }

    /// Drop a workflow's snapshot
    pub fn remove(&self, id: &WorkflowId) -> bool {
        self.snapshots.remove(id).is_some()
    }

    /// Workflows with a snapshot
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True when nothing is published
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Scores one quality category
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait QualityScorer: Send + Sync {
    /// Category produced by this scorer
    fn category(&self) -> QualityCategory;

    /// Score the snapshot
    async fn score(&self, snapshot: &QualitySnapshot) -> Result<CategoryScore, MonitorError>;
}

/// Score before any phase has produced evidence
pub const NEUTRAL_SCORE: f64 = 75.0;

/// Phase duration treated as on-budget
pub const PHASE_TIME_BUDGET_MS: u64 = 60_000;

/// Scorer deriving a category score from phase results
#[derive(Debug, Clone, Copy)]
pub struct PhaseMetricsScorer {
    category: QualityCategory,
}

impl PhaseMetricsScorer {
    /// Scorer for one category
    #[must_use]
    pub fn new(category: QualityCategory) -> Self {
        Self { category }
    }

    fn code_quality(s: &QualitySnapshot) -> CategoryScore {
        let score = s
            .mean_of(|r| r.quality_metrics.best_practice_alignment)
            .unwrap_or(NEUTRAL_SCORE);
        let mut out = CategoryScore::new(QualityCategory::CodeQuality, score);
        for r in s.phase_results.iter().filter(|r| !r.success) {
            out = out.with_issue(IssueSeverity::High, format!("phase {} failed", r.phase_name));
        }
        out
    }

    fn security(s: &QualitySnapshot) -> CategoryScore {
        let mut score = s.mean_of(|r| r.quality_metrics.overall).unwrap_or(NEUTRAL_SCORE);
        let has_security_phase = s
            .workflow
            .phases
            .iter()
            .any(|p| p.role == AgentRole::SecurityEngineer);
        let mut issues = Vec::new();
        if !s.workflow.context.compliance.is_empty() && !has_security_phase {
            score -= 15.0;
            issues.push((
                IssueSeverity::Medium,
                format!(
                    "compliance ({}) required but no security phase planned",
                    s.workflow.context.compliance.join(", ")
                ),
            ));
        }
        issues
            .into_iter()
            .fold(CategoryScore::new(QualityCategory::Security, score), |acc, (sev, msg)| {
                acc.with_issue(sev, msg)
            })
    }

    fn dependencies(s: &QualitySnapshot) -> CategoryScore {
        let phases = &s.workflow.phases;
        if phases.is_empty() {
            return CategoryScore::new(QualityCategory::Dependencies, NEUTRAL_SCORE);
        }
        let mut blocked = Vec::new();
        for phase in phases.iter().filter(|p| p.status == PhaseStatus::Pending) {
            let failed_dep = phase.dependencies.iter().find(|d| {
                phases
                    .iter()
                    .any(|p| &p.name == *d && p.status == PhaseStatus::Failed)
            });
            if let Some(dep) = failed_dep {
                blocked.push(format!("phase {} blocked by failed dependency {dep}", phase.name));
            }
        }
        let score = 100.0 * (1.0 - blocked.len() as f64 / phases.len() as f64);
        blocked
            .into_iter()
            .fold(CategoryScore::new(QualityCategory::Dependencies, score), |acc, msg| {
                acc.with_issue(IssueSeverity::Critical, msg)
            })
    }

    fn performance(s: &QualitySnapshot) -> CategoryScore {
        if s.phase_results.is_empty() {
            return CategoryScore::new(QualityCategory::Performance, NEUTRAL_SCORE);
        }
        let total: u64 = s.phase_results.iter().map(|r| r.duration_ms).sum();
        let mean = total / s.phase_results.len() as u64;
        let score = if mean <= PHASE_TIME_BUDGET_MS {
            100.0
        } else {
            100.0 * PHASE_TIME_BUDGET_MS as f64 / mean as f64
        };
        let mut out = CategoryScore::new(QualityCategory::Performance, score);
        for r in s.phase_results.iter().filter(|r| r.duration_ms > PHASE_TIME_BUDGET_MS * 2) {
            out = out.with_issue(
                IssueSeverity::Medium,
                format!("phase {} took {} ms", r.phase_name, r.duration_ms),
            );
        }
        out
    }

    fn testing(s: &QualitySnapshot) -> CategoryScore {
        let planned = s.workflow.phases.iter().any(|p| p.role == AgentRole::Tester);
        let tested = s
            .phase_results
            .iter()
            .find(|r| r.role == AgentRole::Tester && r.success);
        match (planned, tested) {
            (_, Some(r)) => CategoryScore::new(QualityCategory::Testing, r.quality_metrics.overall),
            (true, None) => CategoryScore::new(QualityCategory::Testing, NEUTRAL_SCORE),
            (false, None) => CategoryScore::new(QualityCategory::Testing, 40.0)
                .with_issue(IssueSeverity::High, "workflow has no testing phase"),
        }
    }

    fn documentation(s: &QualitySnapshot) -> CategoryScore {
        let score = s
            .mean_of(|r| r.quality_metrics.documentation_depth)
            .unwrap_or(NEUTRAL_SCORE);
        let out = CategoryScore::new(QualityCategory::Documentation, score);
        if score < 30.0 {
            out.with_issue(IssueSeverity::Medium, "documentation coverage is thin")
        } else {
            out
        }
    }

    fn external_integration(s: &QualitySnapshot) -> CategoryScore {
        let score = s
            .mean_of(|r| r.quality_metrics.integration_reliability)
            .unwrap_or(NEUTRAL_SCORE);
        let fallback = s.phase_results.iter().filter(|r| r.used_fallback()).count();
        let out = CategoryScore::new(QualityCategory::ExternalIntegration, score);
        match fallback {
            0 => out,
            n if n == s.phase_results.len() => out.with_issue(
                IssueSeverity::High,
                "knowledge broker unavailable for every phase",
            ),
            n => out.with_issue(IssueSeverity::Medium, format!("{n} phase(s) used fallback insights")),
        }
    }
}

#[async_trait::async_trait]
impl QualityScorer for PhaseMetricsScorer {
    fn category(&self) -> QualityCategory {
        self.category
    }

    async fn score(&self, snapshot: &QualitySnapshot) -> Result<CategoryScore, MonitorError> {
        Ok(match self.category {
            QualityCategory::CodeQuality => Self::code_quality(snapshot),
            QualityCategory::Security => Self::security(snapshot),
            QualityCategory::Dependencies => Self::dependencies(snapshot),
            QualityCategory::Performance => Self::performance(snapshot),
            QualityCategory::Testing => Self::testing(snapshot),
            QualityCategory::Documentation => Self::documentation(snapshot),
            QualityCategory::ExternalIntegration => Self::external_integration(snapshot),
        })
    }
}

/// One [`PhaseMetricsScorer`] per category
#[must_use]
pub fn default_scorers() -> Vec<Arc<dyn QualityScorer>> {
    QualityCategory::ALL
        .into_iter()
        .map(|c| Arc::new(PhaseMetricsScorer::new(c)) as Arc<dyn QualityScorer>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdlc_core::{BusinessContext, PhaseQualityMetrics, WorkflowPhase};

    fn result(name: &str, role: AgentRole, success: bool, quality: f64) -> PhaseResult {
        PhaseResult {
            phase_name: name.to_string(),
            role,
            success,
            deliverables: Vec::new(),
            quality_metrics: PhaseQualityMetrics {
                overall: quality,
                insight_coverage: quality,
                documentation_depth: quality,
                best_practice_alignment: quality,
                integration_reliability: quality,
            },
            duration_ms: 100,
            insights: None,
            issues: Vec::new(),
        }
    }

    fn snapshot(phases: Vec<WorkflowPhase>, results: Vec<PhaseResult>) -> QualitySnapshot {
        let workflow = Workflow::new("wf", phases, BusinessContext::new("p", "retail"));
        QualitySnapshot::new(workflow, results, Utc::now())
    }

    #[tokio::test]
    async fn neutral_before_evidence() {
        let snap = snapshot(vec![WorkflowPhase::new("build", AgentRole::Developer)], vec![]);
        let score = PhaseMetricsScorer::new(QualityCategory::Documentation)
            .score(&snap)
            .await
            .unwrap();
        assert_eq!(score.score, NEUTRAL_SCORE);
    }

    #[tokio::test]
    async fn blocked_phase_is_critical() {
        let mut first = WorkflowPhase::new("a", AgentRole::Developer);
        first.status = PhaseStatus::Failed;
        let second = WorkflowPhase::new("b", AgentRole::Tester).with_dependencies(["a"]);
        let snap = snapshot(vec![first, second], vec![result("a", AgentRole::Developer, false, 0.0)]);

        let score = PhaseMetricsScorer::new(QualityCategory::Dependencies)
            .score(&snap)
            .await
            .unwrap();

        assert_eq!(score.score, 50.0);
        assert_eq!(score.issues.len(), 1);
        assert_eq!(score.issues[0].severity, IssueSeverity::Critical);
    }

    #[tokio::test]
    async fn testing_score_follows_tester_phase() {
        let snap = snapshot(
            vec![WorkflowPhase::new("qa", AgentRole::Tester)],
            vec![result("qa", AgentRole::Tester, true, 88.0)],
        );
        let score = PhaseMetricsScorer::new(QualityCategory::Testing).score(&snap).await.unwrap();
        assert_eq!(score.score, 88.0);

        let untested = snapshot(vec![WorkflowPhase::new("build", AgentRole::Developer)], vec![]);
        let score = PhaseMetricsScorer::new(QualityCategory::Testing)
            .score(&untested)
            .await
            .unwrap();
        assert_eq!(score.issues[0].severity, IssueSeverity::High);
    }

    #[tokio::test]
    async fn compliance_without_security_phase_is_flagged() {
        let mut snap = snapshot(vec![WorkflowPhase::new("build", AgentRole::Developer)], vec![]);
        snap.workflow.context = snap.workflow.context.clone().with_compliance(["SOC2"]);

        let score = PhaseMetricsScorer::new(QualityCategory::Security).score(&snap).await.unwrap();

        assert_eq!(score.score, NEUTRAL_SCORE - 15.0);
        assert_eq!(score.issues.len(), 1);
    }

    #[test]
    fn board_replaces_snapshots() {
        let board = SnapshotBoard::new();
        let snap = snapshot(vec![], vec![]);
        let id = snap.workflow.id.clone();
        board.publish(snap.clone());
        board.publish(snap);
        assert_eq!(board.len(), 1);
        assert!(board.get(&id).is_some());
        assert!(board.remove(&id));
        assert!(board.is_empty());
    }

    #[test]
    fn default_scorers_cover_all_categories() {
        let categories: Vec<_> = default_scorers().iter().map(|s| s.category()).collect();
        assert_eq!(categories, QualityCategory::ALL.to_vec());
    }
}
