//! Phase execution

use crate::error::PhaseExecutionError;
use sdlc_core::{
    AgentRole, BusinessContext, InsightBundle, InsightCategory, PhaseQualityMetrics, PhaseResult,
    PhaseStatus, Workflow, WorkflowPhase,
};
use sdlc_insights::{InsightGatherer, FALLBACK_SOURCE};
use std::sync::Arc;
use std::time::Instant;

/// Items per category that count as full depth
pub const EXPECTED_ITEMS_PER_CATEGORY: usize = 3;

/// Runs a single phase of a workflow
///
/// Implement this trait to replace how phases are executed; the
/// orchestrator only sequences phases and records their results.
#[async_trait::async_trait]
pub trait PhaseRunner: Send + Sync {
    /// Execute `phase` of `workflow`
    ///
    /// `workflow` carries the statuses of earlier phases. Failures are
    /// reported through an unsuccessful [`PhaseResult`], never a panic.
    async fn execute_phase(
        &self,
        phase: &WorkflowPhase,
        workflow: &Workflow,
        context: &BusinessContext,
    ) -> PhaseResult;
}

/// Default runner: dependency check, insight gathering, quality scoring
#[derive(Debug)]
pub struct PhaseExecutor {
    gatherer: Arc<InsightGatherer>,
    min_phase_quality: Option<f64>,
}

impl PhaseExecutor {
    /// Create executor
    #[must_use]
    pub fn new(gatherer: Arc<InsightGatherer>) -> Self {
        Self {
            gatherer,
            min_phase_quality: None,
        }
    }

    /// Fail phases whose overall quality is below `minimum`
    #[must_use]
    pub fn with_quality_gate(mut self, minimum: Option<f64>) -> Self {
        self.min_phase_quality = minimum;
        self
    }

    /// Every dependency of `phase` must have completed
    ///
    /// # Errors
    /// `PhaseExecutionError` naming the first unmet dependency.
    pub fn check_dependencies(phase: &WorkflowPhase, workflow: &Workflow) -> Result<(), PhaseExecutionError> {
        for dependency in &phase.dependencies {
            let dep = workflow
                .phase(dependency)
                .ok_or_else(|| PhaseExecutionError::UnknownDependency {
                    phase: phase.name.clone(),
                    dependency: dependency.clone(),
                })?;
            if dep.status != PhaseStatus::Completed {
                return Err(PhaseExecutionError::DependencyNotMet {
                    phase: phase.name.clone(),
                    dependency: dependency.clone(),
                    status: dep.status,
                });
            }
        }
        Ok(())
    }

    async fn try_execute(
        &self,
        phase: &WorkflowPhase,
        workflow: &Workflow,
        context: &BusinessContext,
        started: Instant,
    ) -> Result<PhaseResult, PhaseExecutionError> {
        Self::check_dependencies(phase, workflow)?;

        let insights = self.gatherer.gather(&phase.name, phase.role, context).await;
        let quality_metrics = phase_quality(&insights);
        let deliverables = deliverables_for(phase);

        let mut issues: Vec<String> = insights
            .fallback_categories
            .iter()
            .map(|c| format!("fallback insights used for {c}"))
            .collect();

        let mut success = true;
        if let Some(minimum) = self.min_phase_quality {
            if quality_metrics.overall < minimum {
                success = false;
                issues.push(
                    PhaseExecutionError::QualityGate {
                        phase: phase.name.clone(),
                        score: quality_metrics.overall,
                        minimum,
                    }
                    .to_string(),
                );
            }
        }

        Ok(PhaseResult {
            phase_name: phase.name.clone(),
            role: phase.role,
            success,
            deliverables,
            quality_metrics,
            duration_ms: elapsed_ms(started),
            insights: Some(insights),
            issues,
        })
    }
}

#[async_trait::async_trait]
impl PhaseRunner for PhaseExecutor {
    async fn execute_phase(
        &self,
        phase: &WorkflowPhase,
        workflow: &Workflow,
        context: &BusinessContext,
    ) -> PhaseResult {
        let started = Instant::now();
        tracing::info!(workflow_id = %workflow.id, phase = %phase.name, role = %phase.role, "executing phase");

        match self.try_execute(phase, workflow, context, started).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(workflow_id = %workflow.id, phase = %phase.name, error = %err, "phase failed");
                PhaseResult::failed(&phase.name, phase.role, err.to_string(), elapsed_ms(started))
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn depth(items: &[sdlc_core::InsightItem]) -> f64 {
    // fallback content counts half
    let weight: f64 = items
        .iter()
        .map(|i| if i.source == FALLBACK_SOURCE { 0.5 } else { 1.0 })
        .sum();
    (weight / EXPECTED_ITEMS_PER_CATEGORY as f64).min(1.0) * 100.0
}

/// Quality of a phase derived from its insight bundle, each metric 0-100
#[must_use]
pub fn phase_quality(bundle: &InsightBundle) -> PhaseQualityMetrics {
    let categories = InsightCategory::ALL.len() as f64;
    let live = InsightCategory::ALL
        .iter()
        .filter(|c| !bundle.fallback_categories.contains(c) && !bundle.items(**c).is_empty())
        .count() as f64;

    let insight_coverage = live / categories * 100.0;
    let documentation_depth = depth(&bundle.documentation);
    let best_practice_alignment = depth(&bundle.best_practices);
    let integration_reliability =
        (categories - bundle.fallback_categories.len() as f64) / categories * 100.0;

    let overall = 0.30 * insight_coverage
        + 0.25 * documentation_depth
        + 0.25 * best_practice_alignment
        + 0.20 * integration_reliability;

    PhaseQualityMetrics {
        overall,
        insight_coverage,
        documentation_depth,
        best_practice_alignment,
        integration_reliability,
    }
}

/// Deliverables a phase produces for its role
#[must_use]
pub fn deliverables_for(phase: &WorkflowPhase) -> Vec<String> {
    let artifacts: &[&str] = match phase.role {
        AgentRole::ProductManager => &["product brief", "prioritised backlog"],
        AgentRole::BusinessAnalyst => &["requirements specification", "acceptance criteria"],
        AgentRole::Architect => &["architecture decision records", "system design"],
        AgentRole::Developer => &["implementation plan", "code review checklist"],
        AgentRole::Tester => &["test plan", "test cases"],
        AgentRole::SecurityEngineer => &["threat model", "security review"],
        AgentRole::DevOps => &["deployment pipeline", "runbook"],
        AgentRole::TechnicalWriter => &["user guide", "api reference"],
    };
    artifacts
        .iter()
        .map(|a| format!("{}: {a}", phase.name))
        .chain(phase.tools.iter().map(|t| format!("{}: {t} configuration", phase.name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sdlc_core::InsightItem;

    fn bundle(per_category: usize) -> InsightBundle {
        let mut bundle = InsightBundle::empty(Utc::now());
        for category in InsightCategory::ALL {
            let items = (0..per_category)
                .map(|i| InsightItem::new(format!("{category} {i}"), "c", "broker"))
                .collect();
            bundle.set_items(category, items);
        }
        bundle
    }

    #[test]
    fn full_bundle_scores_full_marks() {
        let metrics = phase_quality(&bundle(3));
        assert!((metrics.overall - 100.0).abs() < 1e-9);
    }

    #[test]
    fn fallback_lowers_coverage_and_reliability() {
        let mut b = bundle(3);
        b.set_items(
            InsightCategory::Documentation,
            vec![InsightItem::new("doc", "c", FALLBACK_SOURCE); 2],
        );
        b.fallback_used = true;
        b.fallback_categories = vec![InsightCategory::Documentation];

        let metrics = phase_quality(&b);

        assert_eq!(metrics.insight_coverage, 75.0);
        assert_eq!(metrics.integration_reliability, 75.0);
        assert!((metrics.documentation_depth - 100.0 / 3.0).abs() < 1e-9);
        assert!(metrics.overall < 100.0);
    }

    #[test]
    fn empty_bundle_scores_zero() {
        let metrics = phase_quality(&InsightBundle::empty(Utc::now()));
        assert_eq!(metrics.insight_coverage, 0.0);
        assert_eq!(metrics.documentation_depth, 0.0);
        // nothing fell back either
        assert_eq!(metrics.integration_reliability, 100.0);
    }

    #[test]
    fn deliverables_include_tools() {
        let phase = WorkflowPhase::new("deployment", AgentRole::DevOps).with_tools(["terraform"]);
        let deliverables = deliverables_for(&phase);
        assert_eq!(deliverables[0], "deployment: deployment pipeline");
        assert_eq!(deliverables.last().map(String::as_str), Some("deployment: terraform configuration"));
    }

    #[test]
    fn dependencies_must_be_completed() {
        let mut workflow = Workflow::new(
            "wf",
            vec![
                WorkflowPhase::new("a", AgentRole::Architect),
                WorkflowPhase::new("b", AgentRole::Developer).with_dependencies(["a"]),
            ],
            sdlc_core::BusinessContext::new("p", "d"),
        );
        let b = workflow.phases[1].clone();

        let err = PhaseExecutor::check_dependencies(&b, &workflow).unwrap_err();
        assert!(matches!(err, PhaseExecutionError::DependencyNotMet { status: PhaseStatus::Pending, .. }));

        workflow.phases[0].status = PhaseStatus::Completed;
        assert!(PhaseExecutor::check_dependencies(&b, &workflow).is_ok());
    }
}
