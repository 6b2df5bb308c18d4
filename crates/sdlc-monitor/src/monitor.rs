//! Per-workflow monitoring tasks

use crate::check::{apply_outcome, evaluate_check};
use crate::error::MonitorError;
use crate::scorer::{default_scorers, QualityScorer, SnapshotBoard};
use crate::types::{QualityAlert, QualityHistoryEntry, QualityMonitoringState, QualityReport};
use dashmap::DashMap;
use sdlc_core::{elapsed_since, MonitorConfig, SharedClock, WorkflowId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use ulid::Ulid;

struct MonitorTask {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct MonitorInner {
    config: MonitorConfig,
    scorers: Vec<Arc<dyn QualityScorer>>,
    board: SnapshotBoard,
    states: DashMap<WorkflowId, QualityMonitoringState>,
    clock: SharedClock,
}

impl MonitorInner {
    async fn run_check(&self, id: &WorkflowId, force: bool) -> Result<Option<QualityHistoryEntry>, MonitorError> {
        let state = self
            .states
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| MonitorError::NotMonitored(id.clone()))?;

        if !force {
            if let Some(last) = state.last_check {
                if elapsed_since(self.clock.as_ref(), last) < self.config.quality_check_interval() {
                    return Ok(None);
                }
            }
        }

        let snapshot = self
            .board
            .get(id)
            .ok_or_else(|| MonitorError::NoSnapshot(id.clone()))?;

        let mut sample = Vec::with_capacity(self.scorers.len());
        for scorer in &self.scorers {
            sample.push(scorer.score(&snapshot).await?);
        }

        let outcome = evaluate_check(&state, &sample, self.clock.now(), &self.config);
        let entry = outcome.entry.clone();
        for alert in &outcome.alerts {
            tracing::warn!(
                workflow_id = %id,
                alert_type = ?alert.alert_type,
                severity = ?alert.severity,
                "{}",
                alert.message
            );
        }

        match self.states.get_mut(id) {
            Some(mut current) => apply_outcome(&mut current, outcome, &self.config),
            // cleared while scoring
            None => return Err(MonitorError::NotMonitored(id.clone())),
        }
        tracing::debug!(workflow_id = %id, score = entry.overall_score, "quality check recorded");
        Ok(Some(entry))
    }
}

/// Quality monitor for running workflows
///
/// Each monitored workflow gets a spawned interval task. Ticks are debounced
/// by the configured check interval, measured on the injected clock.
pub struct QualityMonitor {
    inner: Arc<MonitorInner>,
    tasks: DashMap<WorkflowId, MonitorTask>,
}

impl std::fmt::Debug for QualityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityMonitor")
            .field("config", &self.inner.config)
            .field("scorers", &self.inner.scorers.len())
            .field("workflows", &self.inner.states.len())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl QualityMonitor {
    /// Monitor with the built-in scorers
    #[must_use]
    pub fn new(config: MonitorConfig, board: SnapshotBoard, clock: SharedClock) -> Self {
        Self::with_scorers(config, board, clock, default_scorers())
    }

    /// Monitor with custom scorers
    #[must_use]
    pub fn with_scorers(
        config: MonitorConfig,
        board: SnapshotBoard,
        clock: SharedClock,
        scorers: Vec<Arc<dyn QualityScorer>>,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                config,
                scorers,
                board,
                states: DashMap::new(),
                clock,
            }),
            tasks: DashMap::new(),
        }
    }

    /// Snapshot board read by checks
    #[inline]
    #[must_use]
    pub fn board(&self) -> &SnapshotBoard {
        &self.inner.board
    }

    /// Start periodic checks for a workflow
    ///
    /// Must be called within a tokio runtime. Restarting keeps history.
    /// Returns `false` when the workflow is already monitored.
    pub fn start_monitoring(&self, id: &WorkflowId) -> bool {
        if self.tasks.contains_key(id) {
            return false;
        }

        let now = self.inner.clock.now();
        self.inner
            .states
            .entry(id.clone())
            .and_modify(|s| s.active = true)
            .or_insert_with(|| QualityMonitoringState::new(id.clone(), now));

        let (cancel, mut cancelled) = oneshot::channel::<()>();
        let inner = Arc::clone(&self.inner);
        let task_id = id.clone();
        let period = self.inner.config.interval().max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    _ = ticker.tick() => {
                        if let Err(err) = inner.run_check(&task_id, false).await {
                            tracing::warn!(workflow_id = %task_id, error = %err, "quality check skipped");
                        }
                    }
                }
            }
            tracing::debug!(workflow_id = %task_id, "monitor task stopped");
        });

        self.tasks.insert(id.clone(), MonitorTask { cancel, handle });
        tracing::info!(workflow_id = %id, ?period, "quality monitoring started");
        true
    }

    /// Stop periodic checks, keeping state and history
    pub fn stop_monitoring(&self, id: &WorkflowId) -> bool {
        let Some((_, task)) = self.tasks.remove(id) else {
            return false;
        };
        if task.cancel.send(()).is_err() {
            task.handle.abort();
        }
        if let Some(mut state) = self.inner.states.get_mut(id) {
            state.active = false;
        }
        tracing::info!(workflow_id = %id, "quality monitoring stopped");
        true
    }

    /// Stop and forget a workflow
    pub fn clear(&self, id: &WorkflowId) -> bool {
        self.stop_monitoring(id);
        self.inner.states.remove(id).is_some()
    }

    /// Whether a task is running for the workflow
    #[must_use]
    pub fn is_monitoring(&self, id: &WorkflowId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Run a check now, ignoring the debounce window
    ///
    /// # Errors
    /// - `MonitorError::NotMonitored` if the workflow has no state
    /// - `MonitorError::NoSnapshot` if nothing was published for it
    /// - `MonitorError::Scorer` if any scorer failed; history is untouched
    pub async fn check_now(&self, id: &WorkflowId) -> Result<QualityHistoryEntry, MonitorError> {
        self.inner
            .run_check(id, true)
            .await?
            .ok_or_else(|| MonitorError::NotMonitored(id.clone()))
    }

    /// Clone of the monitoring state
    #[must_use]
    pub fn state(&self, id: &WorkflowId) -> Option<QualityMonitoringState> {
        self.inner.states.get(id).map(|s| s.value().clone())
    }

    /// Current quality summary
    #[must_use]
    pub fn quality_metrics(&self, id: &WorkflowId) -> Option<QualityReport> {
        let state = self.state(id)?;
        let category_scores = state
            .latest()
            .map(|e| e.category_scores.clone())
            .unwrap_or_default();
        let recommendations = state
            .latest()
            .map(|e| e.recommendations.clone())
            .unwrap_or_default();
        Some(QualityReport {
            workflow_id: state.workflow_id.clone(),
            active: state.active,
            current_score: state.current_score,
            trend: state.trend(),
            checks: state.history.len(),
            open_alerts: state.open_alerts().count(),
            last_check: state.last_check,
            category_scores,
            recommendations,
        })
    }

    /// Last `limit` history entries, oldest first
    #[must_use]
    pub fn quality_trend_history(&self, id: &WorkflowId, limit: usize) -> Vec<QualityHistoryEntry> {
        self.inner
            .states
            .get(id)
            .map(|s| {
                let skip = s.history.len().saturating_sub(limit);
                s.history.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Unresolved alerts, for one workflow or all
    #[must_use]
    pub fn active_alerts(&self, id: Option<&WorkflowId>) -> Vec<QualityAlert> {
        let mut alerts: Vec<QualityAlert> = match id {
            Some(id) => self
                .inner
                .states
                .get(id)
                .map(|s| s.open_alerts().cloned().collect())
                .unwrap_or_default(),
            None => self
                .inner
                .states
                .iter()
                .flat_map(|s| s.open_alerts().cloned().collect::<Vec<_>>())
                .collect(),
        };
        alerts.sort_by_key(|a| a.timestamp);
        alerts
    }

    /// Mark an alert acknowledged; returns whether it exists
    pub fn acknowledge_alert(&self, alert_id: Ulid) -> bool {
        self.update_alert(alert_id, |a| a.acknowledged = true)
    }

    /// Mark an alert resolved; returns whether it exists
    pub fn resolve_alert(&self, alert_id: Ulid) -> bool {
        self.update_alert(alert_id, |a| a.resolved = true)
    }

    fn update_alert(&self, alert_id: Ulid, f: impl Fn(&mut QualityAlert)) -> bool {
        for mut state in self.inner.states.iter_mut() {
            if let Some(alert) = state.alerts.iter_mut().find(|a| a.id == alert_id) {
                f(alert);
                return true;
            }
        }
        false
    }

    /// Stop every task
    pub fn shutdown(&self) {
        let ids: Vec<WorkflowId> = self.tasks.iter().map(|t| t.key().clone()).collect();
        for id in ids {
            self.stop_monitoring(&id);
        }
    }
}

impl Drop for QualityMonitor {
    fn drop(&mut self) {
        for task in self.tasks.iter() {
            task.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{MockQualityScorer, QualitySnapshot};
    use crate::types::{AlertType, CategoryScore};
    use chrono::Utc;
    use sdlc_core::{AgentRole, BusinessContext, ManualClock, QualityCategory, Workflow, WorkflowPhase};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scorer replaying a scripted series of uniform scores
    struct ScriptedScorer {
        category: QualityCategory,
        scores: Arc<Mutex<Vec<f64>>>,
    }

    #[async_trait::async_trait]
    impl QualityScorer for ScriptedScorer {
        fn category(&self) -> QualityCategory {
            self.category
        }

        async fn score(&self, _snapshot: &QualitySnapshot) -> Result<CategoryScore, MonitorError> {
            let scores = self.scores.lock().unwrap();
            Ok(CategoryScore::new(self.category, scores.first().copied().unwrap_or(100.0)))
        }
    }

    fn scripted(scores: &Arc<Mutex<Vec<f64>>>) -> Vec<Arc<dyn QualityScorer>> {
        QualityCategory::ALL
            .into_iter()
            .map(|category| {
                Arc::new(ScriptedScorer {
                    category,
                    scores: Arc::clone(scores),
                }) as Arc<dyn QualityScorer>
            })
            .collect()
    }

    fn publish(board: &SnapshotBoard) -> WorkflowId {
        let workflow = Workflow::new(
            "wf",
            vec![WorkflowPhase::new("build", AgentRole::Developer)],
            BusinessContext::new("p", "retail"),
        );
        let id = workflow.id.clone();
        board.publish(QualitySnapshot::new(workflow, Vec::new(), Utc::now()));
        id
    }

    fn config() -> MonitorConfig {
        let mut config = MonitorConfig::default().with_degradation_threshold(10.0);
        config.warning_threshold = 50.0;
        config
    }

    #[tokio::test]
    async fn forced_checks_raise_one_degradation() {
        let clock = ManualClock::starting_now();
        let board = SnapshotBoard::new();
        let id = publish(&board);
        let scores = Arc::new(Mutex::new(vec![80.0]));
        let monitor = QualityMonitor::with_scorers(config(), board, clock.shared(), scripted(&scores));
        monitor.start_monitoring(&id);

        monitor.check_now(&id).await.unwrap();
        monitor.check_now(&id).await.unwrap();
        *scores.lock().unwrap() = vec![60.0];
        monitor.check_now(&id).await.unwrap();

        let alerts = monitor.active_alerts(Some(&id));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Degradation);
        assert_eq!(monitor.quality_trend_history(&id, 10).len(), 3);
        monitor.shutdown();
    }

    #[tokio::test]
    async fn resolve_twice_is_idempotent() {
        let clock = ManualClock::starting_now();
        let board = SnapshotBoard::new();
        let id = publish(&board);
        let scores = Arc::new(Mutex::new(vec![90.0]));
        let monitor = QualityMonitor::with_scorers(config(), board, clock.shared(), scripted(&scores));
        monitor.start_monitoring(&id);
        monitor.check_now(&id).await.unwrap();
        *scores.lock().unwrap() = vec![40.0];
        monitor.check_now(&id).await.unwrap();

        let alert_id = monitor.active_alerts(Some(&id))[0].id;
        assert!(monitor.resolve_alert(alert_id));
        assert!(monitor.resolve_alert(alert_id));

        let state = monitor.state(&id).unwrap();
        let matching: Vec<_> = state.alerts.iter().filter(|a| a.id == alert_id).collect();
        assert_eq!(matching.len(), 1);
        assert!(matching[0].resolved);
        assert!(!monitor.acknowledge_alert(Ulid::new()));
        monitor.shutdown();
    }

    #[tokio::test]
    async fn failing_scorer_skips_check() {
        let clock = ManualClock::starting_now();
        let board = SnapshotBoard::new();
        let id = publish(&board);
        let mut scorer = MockQualityScorer::new();
        scorer.expect_category().return_const(QualityCategory::Security);
        scorer.expect_score().returning(|_| {
            Err(MonitorError::Scorer {
                category: QualityCategory::Security,
                message: "analyzer offline".into(),
            })
        });
        let monitor = QualityMonitor::with_scorers(config(), board, clock.shared(), vec![Arc::new(scorer)]);
        monitor.start_monitoring(&id);

        let err = monitor.check_now(&id).await.unwrap_err();

        assert!(matches!(err, MonitorError::Scorer { .. }));
        assert!(monitor.quality_trend_history(&id, 10).is_empty());
        monitor.shutdown();
    }

    #[tokio::test]
    async fn check_requires_state_and_snapshot() {
        let clock = ManualClock::starting_now();
        let monitor = QualityMonitor::new(config(), SnapshotBoard::new(), clock.shared());
        let id = WorkflowId::from("unknown");

        assert!(matches!(monitor.check_now(&id).await, Err(MonitorError::NotMonitored(_))));
        monitor.start_monitoring(&id);
        assert!(matches!(monitor.check_now(&id).await, Err(MonitorError::NoSnapshot(_))));
        monitor.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_checks_respect_debounce() {
        let clock = ManualClock::starting_now();
        let board = SnapshotBoard::new();
        let id = publish(&board);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut scorer = MockQualityScorer::new();
        scorer.expect_category().return_const(QualityCategory::Testing);
        let counter = Arc::clone(&calls);
        scorer.expect_score().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(CategoryScore::new(QualityCategory::Testing, 90.0))
        });
        let mut cfg = config();
        cfg.interval_secs = 10;
        cfg.quality_check_interval_secs = 30;
        let monitor = QualityMonitor::with_scorers(cfg, board, clock.shared(), vec![Arc::new(scorer)]);
        monitor.start_monitoring(&id);

        // first check one period in
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // manual clock has not moved: later ticks are debounced
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(monitor.stop_monitoring(&id));
        tokio::time::sleep(Duration::from_secs(60)).await;
        clock.advance(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let state = monitor.state(&id).unwrap();
        assert!(!state.active);
        assert_eq!(state.history.len(), 2);
    }

    #[tokio::test]
    async fn start_twice_is_noop_and_clear_forgets() {
        let clock = ManualClock::starting_now();
        let monitor = QualityMonitor::new(config(), SnapshotBoard::new(), clock.shared());
        let id = WorkflowId::from("wf");

        assert!(monitor.start_monitoring(&id));
        assert!(!monitor.start_monitoring(&id));
        assert!(monitor.is_monitoring(&id));
        assert!(monitor.clear(&id));
        assert!(!monitor.is_monitoring(&id));
        assert!(monitor.state(&id).is_none());
    }

    #[tokio::test]
    async fn report_recommends_weakest_categories() {
        let clock = ManualClock::starting_now();
        let board = SnapshotBoard::new();
        let id = publish(&board);
        let monitor = QualityMonitor::new(config(), board, clock.shared());
        monitor.start_monitoring(&id);
        monitor.check_now(&id).await.unwrap();

        let report = monitor.quality_metrics(&id).unwrap();

        assert_eq!(report.checks, 1);
        assert!(report.current_score.is_some());
        assert_eq!(report.category_scores.len(), QualityCategory::ALL.len());
        // no testing phase planned
        assert!(report.recommendations.iter().any(|r| r.starts_with("testing")));
        monitor.shutdown();
    }
}
