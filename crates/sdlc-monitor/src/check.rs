//! Pure quality check: sample in, history entry and alerts out

use crate::types::{
    AlertSeverity, AlertType, CategoryScore, IssueSeverity, QualityAlert, QualityHistoryEntry,
    QualityMonitoringState,
};
use chrono::{DateTime, Utc};
use sdlc_core::{CategoryWeights, MonitorConfig, QualityCategory};
use serde_json::json;
use std::collections::BTreeMap;

/// Score below which a category gets a recommendation
pub const RECOMMENDATION_THRESHOLD: f64 = 70.0;

/// Result of evaluating one sample against a state
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    /// Entry to append to history
    pub entry: QualityHistoryEntry,
    /// Alerts to append
    pub alerts: Vec<QualityAlert>,
}

/// Weighted mean of category scores
///
/// Only categories present in `sample` contribute; an all-zero weight set
/// falls back to the plain mean.
#[must_use]
pub fn overall_score(sample: &[CategoryScore], weights: &CategoryWeights) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let weight_sum: f64 = sample.iter().map(|s| weights.weight(s.category)).sum();
    if weight_sum <= 0.0 {
        return sample.iter().map(|s| s.score).sum::<f64>() / sample.len() as f64;
    }
    sample
        .iter()
        .map(|s| s.score * weights.weight(s.category))
        .sum::<f64>()
        / weight_sum
}

fn degradation_severity(drop: f64, threshold: f64) -> AlertSeverity {
    if threshold <= 0.0 {
        return AlertSeverity::Medium;
    }
    let ratio = drop / threshold;
    if ratio >= 3.0 {
        AlertSeverity::Critical
    } else if ratio >= 2.0 {
        AlertSeverity::High
    } else {
        AlertSeverity::Medium
    }
}

/// Evaluate `sample` taken at `now` against `state`
///
/// Does not touch `state`; see [`apply_outcome`].
#[must_use]
pub fn evaluate_check(
    state: &QualityMonitoringState,
    sample: &[CategoryScore],
    now: DateTime<Utc>,
    config: &MonitorConfig,
) -> CheckOutcome {
    let overall = overall_score(sample, &config.weights);
    let category_scores: BTreeMap<_, _> = sample.iter().map(|s| (s.category, s.score)).collect();
    let issues: Vec<_> = sample.iter().flat_map(|s| s.issues.iter().cloned()).collect();
    let previous = state.latest();
    let id = &state.workflow_id;
    let mut alerts = Vec::new();

    if let Some(prev) = previous {
        let drop = prev.overall_score - overall;
        if drop > config.degradation_threshold {
            let dropped: Vec<_> = category_scores
                .iter()
                .filter_map(|(category, score)| {
                    let before = prev.category_scores.get(category)?;
                    let delta = before - score;
                    (delta > config.category_degradation_threshold).then(|| {
                        json!({
                            "category": category,
                            "previous": before,
                            "current": score,
                            "drop": delta,
                        })
                    })
                })
                .collect();
            alerts.push(QualityAlert::new(
                id.clone(),
                AlertType::Degradation,
                degradation_severity(drop, config.degradation_threshold),
                format!(
                    "quality dropped {drop:.1} points ({:.1} -> {overall:.1})",
                    prev.overall_score
                ),
                json!({
                    "previous": prev.overall_score,
                    "current": overall,
                    "drop": drop,
                    "categories": dropped,
                }),
                now,
            ));
        }
    }

    let critical: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::Critical)
        .collect();
    if !critical.is_empty() {
        alerts.push(QualityAlert::new(
            id.clone(),
            AlertType::Critical,
            AlertSeverity::Critical,
            format!("{} critical issue(s) detected", critical.len()),
            json!({ "issues": critical }),
            now,
        ));
    }

    let was_above = previous.map_or(true, |p| p.overall_score >= config.warning_threshold);
    if overall < config.warning_threshold && was_above {
        alerts.push(QualityAlert::new(
            id.clone(),
            AlertType::Warning,
            AlertSeverity::Medium,
            format!(
                "quality {overall:.1} below warning threshold {:.1}",
                config.warning_threshold
            ),
            json!({ "current": overall, "threshold": config.warning_threshold }),
            now,
        ));
    }

    let recommendations = recommendations(&category_scores);
    CheckOutcome {
        entry: QualityHistoryEntry {
            timestamp: now,
            overall_score: overall,
            category_scores,
            issues,
            recommendations,
        },
        alerts,
    }
}

/// Hints for up to three categories below [`RECOMMENDATION_THRESHOLD`], weakest first
#[must_use]
pub fn recommendations(scores: &BTreeMap<QualityCategory, f64>) -> Vec<String> {
    use sdlc_core::QualityCategory::*;

    let mut weak: Vec<_> = scores
        .iter()
        .filter(|(_, score)| **score < RECOMMENDATION_THRESHOLD)
        .collect();
    weak.sort_by(|a, b| a.1.total_cmp(b.1));
    weak.into_iter()
        .take(3)
        .map(|(category, score)| {
            let hint = match category {
                CodeQuality => "align implementation with gathered best practices",
                Security => "add a security review phase",
                Dependencies => "unblock phases waiting on failed dependencies",
                Performance => "split long-running phases",
                Testing => "add or strengthen the testing phase",
                Documentation => "expand documentation deliverables",
                ExternalIntegration => "check knowledge broker availability",
            };
            format!("{category} at {score:.0}: {hint}")
        })
        .collect()
}

/// Append an outcome to `state`, enforcing the history and alert caps
pub fn apply_outcome(state: &mut QualityMonitoringState, outcome: CheckOutcome, config: &MonitorConfig) {
    state.last_check = Some(outcome.entry.timestamp);
    state.current_score = Some(outcome.entry.overall_score);
    state.history.push_back(outcome.entry);
    while state.history.len() > config.history_limit.max(1) {
        state.history.pop_front();
    }
    state.alerts.extend(outcome.alerts);
    while state.alerts.len() > config.alert_limit.max(1) {
        state.alerts.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QualityIssue;
    use pretty_assertions::assert_eq;
    use sdlc_core::{QualityCategory, WorkflowId};

    fn uniform(score: f64) -> Vec<CategoryScore> {
        QualityCategory::ALL
            .into_iter()
            .map(|c| CategoryScore::new(c, score))
            .collect()
    }

    fn state() -> QualityMonitoringState {
        QualityMonitoringState::new(WorkflowId::from("wf"), Utc::now())
    }

    fn run(state: &mut QualityMonitoringState, sample: &[CategoryScore], config: &MonitorConfig) -> Vec<QualityAlert> {
        let outcome = evaluate_check(state, sample, Utc::now(), config);
        let alerts = outcome.alerts.clone();
        apply_outcome(state, outcome, config);
        alerts
    }

    #[test]
    fn weighted_overall() {
        let mut sample = uniform(100.0);
        sample[0].score = 0.0; // code_quality, weight 0.20
        let overall = overall_score(&sample, &CategoryWeights::default());
        assert!((overall - 80.0).abs() < 1e-9);
    }

    #[test]
    fn single_degradation_after_drop() {
        let mut config = MonitorConfig::default().with_degradation_threshold(10.0);
        config.warning_threshold = 50.0;
        let mut state = state();

        let first = run(&mut state, &uniform(80.0), &config);
        let second = run(&mut state, &uniform(80.0), &config);
        let third = run(&mut state, &uniform(60.0), &config);

        assert!(first.is_empty());
        assert!(second.is_empty());
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].alert_type, AlertType::Degradation);
        assert_eq!(state.alerts.len(), 1);
        assert_eq!(state.history.len(), 3);
    }

    #[test]
    fn history_entries_keep_recommendations() {
        let config = MonitorConfig::default();
        let mut state = state();
        let mut sample = uniform(90.0);
        sample[4].score = 30.0; // testing
        sample[1].score = 50.0; // security

        run(&mut state, &sample, &config);
        run(&mut state, &uniform(95.0), &config);

        let first = &state.history[0].recommendations;
        assert_eq!(first.len(), 2);
        assert!(first[0].starts_with("testing at 30"));
        assert!(first[1].starts_with("security at 50"));
        assert!(state.history[1].recommendations.is_empty());
    }

    #[test]
    fn recommendations_cap_at_three_weakest() {
        let scores: BTreeMap<QualityCategory, f64> = QualityCategory::ALL
            .into_iter()
            .enumerate()
            .map(|(i, c)| (c, 10.0 * i as f64))
            .collect();
        let hints = recommendations(&scores);
        assert_eq!(hints.len(), 3);
        assert!(hints[0].starts_with(&QualityCategory::ALL[0].to_string()));
    }

    #[test]
    fn degradation_names_dropped_categories() {
        let config = MonitorConfig::default();
        let mut state = state();
        run(&mut state, &uniform(90.0), &config);

        let mut sample = uniform(85.0);
        sample[1].score = 20.0; // security
        let alerts = run(&mut state, &sample, &config);

        let degradation = alerts
            .iter()
            .find(|a| a.alert_type == AlertType::Degradation)
            .unwrap();
        let categories = degradation.details["categories"].as_array().unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0]["category"], "security");
    }

    #[test]
    fn severity_scales_with_drop() {
        assert_eq!(degradation_severity(11.0, 10.0), AlertSeverity::Medium);
        assert_eq!(degradation_severity(25.0, 10.0), AlertSeverity::High);
        assert_eq!(degradation_severity(40.0, 10.0), AlertSeverity::Critical);
    }

    #[test]
    fn critical_issue_raises_alert() {
        let config = MonitorConfig::default();
        let mut sample = uniform(90.0);
        sample[2].issues.push(QualityIssue::new(
            QualityCategory::Dependencies,
            IssueSeverity::Critical,
            "blocked",
        ));

        let outcome = evaluate_check(&state(), &sample, Utc::now(), &config);

        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].alert_type, AlertType::Critical);
        assert_eq!(outcome.entry.issues.len(), 1);
    }

    #[test]
    fn warning_only_on_crossing() {
        let config = MonitorConfig::default();
        let mut state = state();

        let first = run(&mut state, &uniform(55.0), &config);
        let second = run(&mut state, &uniform(54.0), &config);
        run(&mut state, &uniform(70.0), &config);
        let again = run(&mut state, &uniform(58.0), &config);

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].alert_type, AlertType::Warning);
        assert!(second.is_empty());
        assert!(again.iter().any(|a| a.alert_type == AlertType::Warning));
    }

    #[test]
    fn caps_history_and_alerts() {
        let mut config = MonitorConfig::default().with_history_limit(2);
        config.alert_limit = 1;
        let mut state = state();
        for score in [90.0, 70.0, 50.0, 30.0] {
            run(&mut state, &uniform(score), &config);
        }
        assert_eq!(state.history.len(), 2);
        assert!((state.history[0].overall_score - 50.0).abs() < 1e-9);
        assert_eq!(state.alerts.len(), 1);
        assert!(state.current_score.is_some_and(|s| (s - 30.0).abs() < 1e-9));
    }

    #[test]
    fn evaluate_does_not_mutate_state() {
        let config = MonitorConfig::default();
        let state = state();
        let before = state.clone();
        let _ = evaluate_check(&state, &uniform(10.0), Utc::now(), &config);
        assert_eq!(state, before);
    }
}
