//! Workflow orchestrator

use crate::error::WorkflowExecutionError;
use crate::metrics::{business_value, technical_metrics};
use crate::optimizer::validate_definition;
use crate::phase::{PhaseExecutor, PhaseRunner};
use dashmap::DashMap;
use sdlc_cache::{CacheDomain, CacheRegistry, RegistryStats};
use sdlc_core::{
    BusinessContext, EngineConfig, PhaseResult, PhaseStatus, ProgressEvent, ProgressStatus,
    SharedClock, Workflow, WorkflowId, WorkflowResult, WorkflowStatus,
};
use sdlc_insights::{InsightGatherer, KnowledgeBroker};
use sdlc_monitor::{
    QualityAlert, QualityHistoryEntry, QualityMonitor, QualityReport, QualitySnapshot, SnapshotBoard,
};
use sdlc_resilience::{RetryExecutor, RetryStats};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use ulid::Ulid;

/// Runs workflows phase by phase
///
/// Owns the caches, the retry executor and the quality monitor shared by
/// every workflow it runs. Several workflows may execute concurrently; each
/// runs its phases strictly in declared order.
pub struct WorkflowOrchestrator {
    config: EngineConfig,
    clock: SharedClock,
    caches: Arc<CacheRegistry>,
    retry: Arc<RetryExecutor>,
    runner: Arc<dyn PhaseRunner>,
    monitor: QualityMonitor,
    active: DashMap<WorkflowId, Workflow>,
    results: DashMap<WorkflowId, WorkflowResult>,
    pauses: DashMap<WorkflowId, watch::Sender<bool>>,
    progress: broadcast::Sender<ProgressEvent>,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("active", &self.active.len())
            .field("results", &self.results.len())
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

impl WorkflowOrchestrator {
    /// Create orchestrator around a broker
    #[must_use]
    pub fn new(config: EngineConfig, broker: Arc<dyn KnowledgeBroker>, clock: SharedClock) -> Self {
        let caches = Arc::new(CacheRegistry::new(&config.cache, clock.clone()));
        let retry = Arc::new(RetryExecutor::new(&config.retry, clock.clone()));
        let gatherer = Arc::new(InsightGatherer::new(
            broker,
            Arc::clone(&caches),
            Arc::clone(&retry),
            config.insights.clone(),
            clock.clone(),
        ));
        let runner = Arc::new(
            PhaseExecutor::new(gatherer).with_quality_gate(config.orchestrator.min_phase_quality),
        );
        let monitor = QualityMonitor::new(config.monitor.clone(), SnapshotBoard::new(), clock.clone());
        let (progress, _) = broadcast::channel(config.orchestrator.progress_channel_capacity.max(1));

        Self {
            config,
            clock,
            caches,
            retry,
            runner,
            monitor,
            active: DashMap::new(),
            results: DashMap::new(),
            pauses: DashMap::new(),
            progress,
        }
    }

    /// Replace the phase runner
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn PhaseRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the quality monitor
    ///
    /// The monitor must read the board returned by [`QualityMonitor::board`];
    /// the orchestrator publishes snapshots there.
    #[must_use]
    pub fn with_monitor(mut self, monitor: QualityMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receive progress events from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// Execute `workflow` with `context`
    ///
    /// `context` replaces the context carried by the definition. Never
    /// fails: problems are reported in the returned result.
    pub async fn execute_workflow(&self, mut workflow: Workflow, context: BusinessContext) -> WorkflowResult {
        let started_at = self.clock.now();
        let started = Instant::now();
        workflow.context = context;
        let id = workflow.id.clone();

        if let Err(err) = self.admit(&workflow) {
            tracing::error!(workflow_id = %id, error = %err, "workflow rejected");
            let result = self.rejected_result(&workflow, &err, started_at);
            if !matches!(err, WorkflowExecutionError::AlreadyRunning(_)) {
                self.results.insert(id.clone(), result.clone());
            }
            self.emit(&id, ProgressStatus::Failed, 0.0, None, Some(serde_json::json!({ "error": err.to_string() })));
            return result;
        }

        let (pause_tx, mut pause_rx) = watch::channel(false);
        self.pauses.insert(id.clone(), pause_tx);

        tracing::info!(workflow_id = %id, name = %workflow.name, phases = workflow.phases.len(), "workflow started");
        self.emit(&id, ProgressStatus::Started, 0.0, None, None);
        if self.config.orchestrator.auto_monitor {
            self.monitor.start_monitoring(&id);
        }

        let total = workflow.phases.len();
        let mut phase_results: Vec<PhaseResult> = Vec::with_capacity(total);
        self.publish(&workflow, &phase_results);

        for index in 0..total {
            self.wait_if_paused(&id, &mut pause_rx).await;

            let name = workflow.phases[index].name.clone();
            self.emit(&id, ProgressStatus::PhaseStarted, percent(index, total), Some(&name), None);
            {
                let phase = &mut workflow.phases[index];
                phase.status = PhaseStatus::Running;
                phase.started_at = Some(self.clock.now());
            }
            self.track(&workflow);

            let context = workflow.context.clone();
            let result = self
                .runner
                .execute_phase(&workflow.phases[index], &workflow, &context)
                .await;
            let success = result.success;
            if !success {
                tracing::warn!(workflow_id = %id, phase = %name, issues = ?result.issues, "phase unsuccessful");
            }
            {
                let phase = &mut workflow.phases[index];
                phase.status = if success { PhaseStatus::Completed } else { PhaseStatus::Failed };
                phase.ended_at = Some(self.clock.now());
                if let Some(insights) = &result.insights {
                    phase.recommended_topics = insights.best_practices.iter().map(|i| i.title.clone()).collect();
                }
            }
            phase_results.push(result);
            self.track(&workflow);
            self.publish(&workflow, &phase_results);

            if !success {
                workflow.status = WorkflowStatus::Failed;
                self.emit(&id, ProgressStatus::PhaseFailed, percent(index, total), Some(&name), None);
                break;
            }
            self.emit(&id, ProgressStatus::PhaseCompleted, percent(index + 1, total), Some(&name), None);
        }

        let success = phase_results.len() == total && phase_results.iter().all(|r| r.success);
        workflow.status = if success { WorkflowStatus::Completed } else { WorkflowStatus::Failed };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = WorkflowResult {
            workflow_id: id.clone(),
            success,
            business_value: business_value(&workflow, &phase_results),
            technical_metrics: technical_metrics(&phase_results, elapsed_ms),
            phase_results,
            errors: Vec::new(),
            started_at,
            completed_at: self.clock.now(),
        };

        if self.config.orchestrator.auto_monitor {
            if let Err(err) = self.monitor.check_now(&id).await {
                tracing::debug!(workflow_id = %id, error = %err, "final quality check skipped");
            }
            self.monitor.stop_monitoring(&id);
        }
        self.monitor.board().remove(&id);

        self.results.insert(id.clone(), result.clone());
        self.active.remove(&id);
        self.pauses.remove(&id);

        let (status, progress) = if success {
            tracing::info!(workflow_id = %id, elapsed_ms, "workflow completed");
            (ProgressStatus::Completed, 100.0)
        } else {
            tracing::error!(workflow_id = %id, elapsed_ms, "workflow failed");
            (ProgressStatus::Failed, percent(result.phase_results.len(), total))
        };
        self.emit(&id, status, progress, None, Some(serde_json::json!({ "elapsed_ms": elapsed_ms })));
        result
    }

    /// Execute a workflow with its own context
    pub async fn run(&self, workflow: Workflow) -> WorkflowResult {
        let context = workflow.context.clone();
        self.execute_workflow(workflow, context).await
    }

    fn admit(&self, workflow: &Workflow) -> Result<(), WorkflowExecutionError> {
        validate_definition(workflow)?;
        let mut tracked = workflow.clone();
        tracked.status = WorkflowStatus::Running;
        for phase in &mut tracked.phases {
            phase.reset();
        }
        match self.active.entry(workflow.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(WorkflowExecutionError::AlreadyRunning(workflow.id.clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(tracked);
                Ok(())
            }
        }
    }

    fn rejected_result(
        &self,
        workflow: &Workflow,
        err: &WorkflowExecutionError,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> WorkflowResult {
        WorkflowResult {
            workflow_id: workflow.id.clone(),
            success: false,
            phase_results: Vec::new(),
            business_value: business_value(workflow, &[]),
            technical_metrics: technical_metrics(&[], 0),
            errors: vec![err.to_string()],
            started_at,
            completed_at: self.clock.now(),
        }
    }

    /// Mirror phase progress into the active set, keeping pause status
    fn track(&self, workflow: &Workflow) {
        if let Some(mut tracked) = self.active.get_mut(&workflow.id) {
            let status = tracked.status;
            *tracked = workflow.clone();
            tracked.status = if status == WorkflowStatus::Paused {
                WorkflowStatus::Paused
            } else {
                WorkflowStatus::Running
            };
        }
    }

    fn publish(&self, workflow: &Workflow, results: &[PhaseResult]) {
        self.monitor.board().publish(QualitySnapshot::new(
            workflow.clone(),
            results.to_vec(),
            self.clock.now(),
        ));
    }

    async fn wait_if_paused(&self, id: &WorkflowId, pause_rx: &mut watch::Receiver<bool>) {
        let paused = *pause_rx.borrow();
        if !paused {
            return;
        }
        tracing::info!(workflow_id = %id, "workflow paused between phases");
        // sender lives in `pauses` until the run ends
        let _ = pause_rx.wait_for(|paused| !*paused).await;
        tracing::info!(workflow_id = %id, "workflow resumed");
    }

    fn set_paused(&self, id: &WorkflowId, paused: bool) -> bool {
        let Some(tx) = self.pauses.get(id) else {
            return false;
        };
        let changed = tx.send_if_modified(|current| {
            if *current == paused {
                false
            } else {
                *current = paused;
                true
            }
        });
        if !changed {
            return false;
        }
        drop(tx);

        let (status, event) = if paused {
            (WorkflowStatus::Paused, ProgressStatus::Paused)
        } else {
            (WorkflowStatus::Running, ProgressStatus::Resumed)
        };
        let progress = self.active.get_mut(id).map(|mut wf| {
            wf.status = status;
            let done = wf.phases.iter().filter(|p| p.status == PhaseStatus::Completed).count();
            percent(done, wf.phases.len())
        });
        self.emit(id, event, progress.unwrap_or(0.0), None, None);
        true
    }

    /// Hold a running workflow before its next phase
    ///
    /// Returns `false` if the workflow is not running or already paused.
    pub fn pause_workflow(&self, id: &WorkflowId) -> bool {
        self.set_paused(id, true)
    }

    /// Release a paused workflow
    ///
    /// Returns `false` if the workflow is not paused.
    pub fn resume_workflow(&self, id: &WorkflowId) -> bool {
        self.set_paused(id, false)
    }

    fn emit(
        &self,
        id: &WorkflowId,
        status: ProgressStatus,
        progress: f64,
        current_phase: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) {
        let event = ProgressEvent {
            workflow_id: id.clone(),
            status,
            progress,
            current_phase: current_phase.map(str::to_string),
            timestamp: self.clock.now(),
            metadata,
        };
        tracing::debug!(workflow_id = %id, ?status, progress, "progress");
        // no subscribers is fine
        let _ = self.progress.send(event);
    }

    /// Status of a running or finished workflow
    #[must_use]
    pub fn workflow_status(&self, id: &WorkflowId) -> Option<WorkflowStatus> {
        if let Some(wf) = self.active.get(id) {
            return Some(wf.status);
        }
        self.results.get(id).map(|r| {
            if r.success {
                WorkflowStatus::Completed
            } else {
                WorkflowStatus::Failed
            }
        })
    }

    /// Result of a finished workflow
    #[must_use]
    pub fn workflow_result(&self, id: &WorkflowId) -> Option<WorkflowResult> {
        self.results.get(id).map(|r| r.value().clone())
    }

    /// Live copy of a running workflow
    #[must_use]
    pub fn active_workflow(&self, id: &WorkflowId) -> Option<Workflow> {
        self.active.get(id).map(|w| w.value().clone())
    }

    /// Ids of running workflows
    #[must_use]
    pub fn active_workflows(&self) -> Vec<WorkflowId> {
        let mut ids: Vec<WorkflowId> = self.active.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Stats for every cache domain
    #[must_use]
    pub fn cache_stats(&self) -> RegistryStats {
        self.caches.stats()
    }

    /// Cache health verdict
    #[must_use]
    pub fn is_cache_healthy(&self) -> bool {
        self.caches.is_healthy()
    }

    /// Clear one cache domain
    pub fn clear_cache(&self, domain: CacheDomain) {
        self.caches.clear(domain);
    }

    /// Retry and circuit breaker stats
    #[must_use]
    pub fn retry_stats(&self) -> RetryStats {
        self.retry.stats()
    }

    /// Close every circuit and zero retry counters
    pub fn reset_retry_state(&self) {
        self.retry.reset();
    }

    /// Quality monitor
    #[inline]
    #[must_use]
    pub fn monitor(&self) -> &QualityMonitor {
        &self.monitor
    }

    /// Current quality summary of a workflow
    #[must_use]
    pub fn quality_metrics(&self, id: &WorkflowId) -> Option<QualityReport> {
        self.monitor.quality_metrics(id)
    }

    /// Last `limit` quality samples of a workflow
    #[must_use]
    pub fn quality_trend_history(&self, id: &WorkflowId, limit: usize) -> Vec<QualityHistoryEntry> {
        self.monitor.quality_trend_history(id, limit)
    }

    /// Unresolved alerts, for one workflow or all
    #[must_use]
    pub fn active_alerts(&self, id: Option<&WorkflowId>) -> Vec<QualityAlert> {
        self.monitor.active_alerts(id)
    }

    /// Acknowledge an alert
    pub fn acknowledge_alert(&self, alert_id: Ulid) -> bool {
        self.monitor.acknowledge_alert(alert_id)
    }

    /// Resolve an alert
    pub fn resolve_alert(&self, alert_id: Ulid) -> bool {
        self.monitor.resolve_alert(alert_id)
    }
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    done as f64 / total as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdlc_core::{AgentRole, InsightItem, ManualClock, PhaseQualityMetrics, WorkflowPhase};
    use sdlc_insights::BrokerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EmptyBroker;

    #[async_trait::async_trait]
    impl KnowledgeBroker for EmptyBroker {
        async fn get_documentation(&self, _: &str) -> Result<Vec<InsightItem>, BrokerError> {
            Ok(vec![InsightItem::new("doc", "c", "broker")])
        }
        async fn get_code_examples(&self, _: &str, _: AgentRole) -> Result<Vec<InsightItem>, BrokerError> {
            Ok(vec![])
        }
        async fn get_best_practices(&self, _: &str) -> Result<Vec<InsightItem>, BrokerError> {
            Ok(vec![InsightItem::new("practice", "c", "broker")])
        }
        async fn get_troubleshooting_guides(&self, _: &str) -> Result<Vec<InsightItem>, BrokerError> {
            Ok(vec![])
        }
    }

    /// Runner that fails a named phase and counts invocations
    struct FailingRunner {
        fail: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PhaseRunner for FailingRunner {
        async fn execute_phase(&self, phase: &WorkflowPhase, _: &Workflow, _: &BusinessContext) -> PhaseResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if phase.name == self.fail {
                return PhaseResult::failed(&phase.name, phase.role, "scripted failure", 1);
            }
            PhaseResult {
                phase_name: phase.name.clone(),
                role: phase.role,
                success: true,
                deliverables: vec![],
                quality_metrics: PhaseQualityMetrics::default(),
                duration_ms: 1,
                insights: None,
                issues: vec![],
            }
        }
    }

    fn orchestrator() -> WorkflowOrchestrator {
        let mut config = EngineConfig::default();
        config.orchestrator.auto_monitor = false;
        WorkflowOrchestrator::new(config, Arc::new(EmptyBroker), ManualClock::starting_now().shared())
    }

    fn workflow() -> Workflow {
        Workflow::new(
            "wf",
            vec![
                WorkflowPhase::new("one", AgentRole::Architect),
                WorkflowPhase::new("two", AgentRole::Developer).with_dependencies(["one"]),
                WorkflowPhase::new("three", AgentRole::Tester).with_dependencies(["two"]),
            ],
            BusinessContext::new("p", "d"),
        )
    }

    #[tokio::test]
    async fn stops_at_first_unsuccessful_phase() {
        let runner = Arc::new(FailingRunner {
            fail: "two",
            calls: AtomicUsize::new(0),
        });
        let orchestrator = orchestrator().with_runner(runner.clone());

        let result = orchestrator.run(workflow()).await;

        assert!(!result.success);
        assert_eq!(result.phase_results.len(), 2);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.workflow_status(&result.workflow_id), Some(WorkflowStatus::Failed));
        assert!(orchestrator.active_workflows().is_empty());
    }

    #[tokio::test]
    async fn finished_runs_leave_no_snapshots() {
        let orchestrator = orchestrator();
        for _ in 0..3 {
            let result = orchestrator.run(workflow()).await;
            assert!(result.success);
        }
        assert!(orchestrator.monitor().board().is_empty());
    }

    #[tokio::test]
    async fn monitored_run_drops_snapshot_after_final_check() {
        let mut config = EngineConfig::default();
        config.orchestrator.auto_monitor = true;
        let orchestrator =
            WorkflowOrchestrator::new(config, Arc::new(EmptyBroker), ManualClock::starting_now().shared());

        let result = orchestrator.run(workflow()).await;

        assert!(orchestrator.quality_metrics(&result.workflow_id).is_some_and(|r| r.checks >= 1));
        assert!(orchestrator.monitor().board().is_empty());
    }

    #[tokio::test]
    async fn invalid_definition_fails_without_running() {
        let orchestrator = orchestrator();
        let wf = Workflow::new("empty", vec![], BusinessContext::new("p", "d"));

        let result = orchestrator.run(wf).await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("no phases"));
        assert!(orchestrator.workflow_result(&result.workflow_id).is_some());
    }

    #[tokio::test]
    async fn context_argument_overrides_definition() {
        let orchestrator = orchestrator();
        let context = BusinessContext::new("other-project", "health");

        let result = orchestrator.execute_workflow(workflow(), context).await;

        assert!(result.success);
        assert_eq!(orchestrator.cache_stats().workflow.entries, 3);
    }

    #[tokio::test]
    async fn progress_events_bracket_phases() {
        let orchestrator = orchestrator();
        let mut events = orchestrator.subscribe();

        orchestrator.run(workflow()).await;

        let mut statuses = Vec::new();
        while let Ok(event) = events.try_recv() {
            statuses.push((event.status, event.progress.round() as u32));
        }
        assert_eq!(statuses.first(), Some(&(ProgressStatus::Started, 0)));
        assert_eq!(statuses[1], (ProgressStatus::PhaseStarted, 0));
        assert_eq!(statuses[2], (ProgressStatus::PhaseCompleted, 33));
        assert_eq!(statuses.last(), Some(&(ProgressStatus::Completed, 100)));
        assert_eq!(statuses.len(), 1 + 3 * 2 + 1);
    }

    #[test]
    fn pause_requires_running_workflow() {
        let orchestrator = orchestrator();
        assert!(!orchestrator.pause_workflow(&WorkflowId::from("nope")));
        assert!(!orchestrator.resume_workflow(&WorkflowId::from("nope")));
    }

    #[test]
    fn percent_handles_empty() {
        assert_eq!(percent(0, 0), 100.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
