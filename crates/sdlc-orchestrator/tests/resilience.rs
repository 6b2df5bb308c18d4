//! Broker failures through the full stack: retries, breakers, timeouts

use sdlc_core::{InsightCategory, ManualClock};
use sdlc_insights::BrokerError;
use sdlc_orchestrator::WorkflowOrchestrator;
use sdlc_resilience::CircuitState;
use sdlc_test_utils::{fast_config, test_context, three_phase_workflow, Script, ScriptedBroker};
use std::sync::Arc;
use std::time::Duration;

fn context(project: &str) -> sdlc_core::BusinessContext {
    let mut context = test_context();
    context.project_id = project.to_string();
    context
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_away() {
    let broker = Arc::new(ScriptedBroker::new().with_script(
        InsightCategory::Documentation,
        Script::FailFirst(2, BrokerError::Unavailable("blip".into())),
    ));
    let orchestrator = WorkflowOrchestrator::new(fast_config(), broker.clone(), ManualClock::starting_now().shared());

    let result = orchestrator.run(three_phase_workflow(test_context())).await;

    assert!(result.success);
    assert_eq!(result.technical_metrics.fallback_categories, 0);
    let stats = orchestrator.retry_stats();
    assert!(stats.total_retries >= 1);
    assert_eq!(stats.failed_calls, 0);
    assert_eq!(stats.open_circuits, 0);
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_are_not_retried() {
    let broker = Arc::new(ScriptedBroker::new().with_script(
        InsightCategory::Troubleshooting,
        Script::Fail(BrokerError::InvalidTopic("unknown".into())),
    ));
    let orchestrator = WorkflowOrchestrator::new(fast_config(), broker.clone(), ManualClock::starting_now().shared());

    let result = orchestrator.run(three_phase_workflow(test_context())).await;

    assert!(result.success);
    let stats = orchestrator.retry_stats();
    assert_eq!(stats.total_retries, 0);
    assert!(stats.failed_calls > 0);
    assert!(result
        .phase_results
        .iter()
        .all(|r| r.insights.as_ref().is_some_and(|b| b.fallback_categories == vec![InsightCategory::Troubleshooting])));
}

#[tokio::test(start_paused = true)]
async fn repeated_outage_opens_circuits_and_stops_calling() {
    let broker = Arc::new(ScriptedBroker::new().with_script(
        InsightCategory::Documentation,
        Script::Fail(BrokerError::Unavailable("docs down".into())),
    ));
    let clock = ManualClock::starting_now();
    let orchestrator = WorkflowOrchestrator::new(fast_config(), broker.clone(), clock.shared());

    // three attempts per topic per run; the breaker threshold is five
    orchestrator.run(three_phase_workflow(context("a"))).await;
    orchestrator.run(three_phase_workflow(context("b"))).await;

    let stats = orchestrator.retry_stats();
    assert!(stats.open_circuits > 0);
    assert!(stats.circuit_rejections > 0);
    assert!(stats
        .circuits
        .iter()
        .filter(|c| c.key.starts_with("documentation"))
        .all(|c| c.state == CircuitState::Open));
    assert!(stats
        .circuits
        .iter()
        .filter(|c| !c.key.starts_with("documentation"))
        .all(|c| c.state == CircuitState::Closed));

    let calls = broker.calls(InsightCategory::Documentation);
    let third = orchestrator.run(three_phase_workflow(context("c"))).await;
    assert_eq!(broker.calls(InsightCategory::Documentation), calls);
    assert!(third.success);
    assert_eq!(third.technical_metrics.fallback_phases, 3);
}

#[tokio::test(start_paused = true)]
async fn reset_closes_circuits_for_recovered_broker() {
    let broker = Arc::new(ScriptedBroker::failing(BrokerError::RateLimited));
    let orchestrator = WorkflowOrchestrator::new(fast_config(), broker.clone(), ManualClock::starting_now().shared());

    orchestrator.run(three_phase_workflow(context("a"))).await;
    orchestrator.run(three_phase_workflow(context("b"))).await;
    assert!(orchestrator.retry_stats().open_circuits > 0);

    for category in InsightCategory::ALL {
        broker.set_script(category, Script::Serve);
    }
    orchestrator.reset_retry_state();
    assert_eq!(orchestrator.retry_stats().open_circuits, 0);

    let result = orchestrator.run(three_phase_workflow(context("c"))).await;
    assert!(result.success);
    assert_eq!(result.technical_metrics.fallback_phases, 0);
}

#[tokio::test(start_paused = true)]
async fn slow_broker_times_out_into_fallback() {
    let broker = Arc::new(ScriptedBroker::new().with_script(
        InsightCategory::CodeExamples,
        Script::Delay(Duration::from_secs(10)),
    ));
    let mut config = fast_config();
    config.insights.broker_timeout_ms = 50;
    let orchestrator = WorkflowOrchestrator::new(config, broker, ManualClock::starting_now().shared());

    let result = orchestrator.run(three_phase_workflow(test_context())).await;

    assert!(result.success);
    for phase in &result.phase_results {
        let insights = phase.insights.as_ref().expect("insights gathered");
        assert_eq!(insights.fallback_categories, vec![InsightCategory::CodeExamples]);
    }
    assert!(orchestrator.retry_stats().total_retries > 0);
}
