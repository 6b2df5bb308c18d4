//! Aggregation of phase results into workflow metrics

use sdlc_core::{AgentRole, BusinessValueMetrics, PhaseResult, TechnicalMetrics, Workflow};

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn is_risk_role(role: AgentRole) -> bool {
    matches!(role, AgentRole::Tester | AgentRole::SecurityEngineer)
}

/// Engineering-facing aggregate
#[must_use]
pub fn technical_metrics(results: &[PhaseResult], total_duration_ms: u64) -> TechnicalMetrics {
    let bundles = results.iter().filter_map(|r| r.insights.as_ref());
    TechnicalMetrics {
        total_duration_ms,
        phases_executed: results.len(),
        phases_succeeded: results.iter().filter(|r| r.success).count(),
        phases_failed: results.iter().filter(|r| !r.success).count(),
        average_phase_quality: mean(results.iter().map(|r| r.quality_metrics.overall)),
        insight_items: bundles.clone().map(|b| b.total_items()).sum(),
        cache_hits: bundles.clone().filter(|b| b.cache_hit).count(),
        fallback_phases: bundles.clone().filter(|b| b.fallback_used).count(),
        fallback_categories: bundles.map(|b| b.fallback_categories.len()).sum(),
    }
}

/// Business-facing aggregate over the planned phases of `workflow`
#[must_use]
pub fn business_value(workflow: &Workflow, results: &[PhaseResult]) -> BusinessValueMetrics {
    let planned = workflow.phases.len().max(1) as f64;
    let succeeded: Vec<&PhaseResult> = results.iter().filter(|r| r.success).collect();

    let automation_coverage = succeeded.len() as f64 / planned * 100.0;
    let delivery_confidence =
        mean(succeeded.iter().map(|r| r.quality_metrics.insight_coverage)) * succeeded.len() as f64 / planned;

    let risk_planned = workflow.phases.iter().filter(|p| is_risk_role(p.role)).count();
    let risk_done = succeeded.iter().filter(|r| is_risk_role(r.role)).count();
    let risk_reduction = if risk_planned == 0 {
        0.0
    } else {
        risk_done as f64 / risk_planned as f64 * 100.0
    };

    BusinessValueMetrics {
        quality_score: mean(results.iter().map(|r| r.quality_metrics.overall)),
        delivery_confidence,
        risk_reduction,
        automation_coverage,
    }
}
