//! Testing utilities for the SDLC engine workspace
//!
//! Scripted broker, fixtures and fast configurations.

#![allow(missing_docs)]

use parking_lot::Mutex;
use sdlc_core::{
    AgentRole, BusinessContext, EngineConfig, InsightCategory, InsightItem, MonitorConfig,
    RetryConfig, Workflow, WorkflowPhase,
};
use sdlc_insights::{BrokerError, KnowledgeBroker};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How the scripted broker treats a category
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Serve one item per topic
    Serve,
    /// Always fail with the given error
    Fail(BrokerError),
    /// Fail the first `n` calls, then serve
    FailFirst(usize, BrokerError),
    /// Sleep before serving
    Delay(Duration),
}

/// Broker whose behaviour is scripted per category
#[derive(Debug, Default)]
pub struct ScriptedBroker {
    scripts: Mutex<HashMap<InsightCategory, Script>>,
    calls: Mutex<HashMap<InsightCategory, usize>>,
    total: AtomicUsize,
}

impl ScriptedBroker {
    /// Broker serving every category
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, category: InsightCategory, script: Script) -> Self {
        self.scripts.lock().insert(category, script);
        self
    }

    /// Fail every category
    pub fn failing(error: BrokerError) -> Self {
        InsightCategory::ALL
            .into_iter()
            .fold(Self::new(), |b, c| b.with_script(c, Script::Fail(error.clone())))
    }

    pub fn set_script(&self, category: InsightCategory, script: Script) {
        self.scripts.lock().insert(category, script);
    }

    pub fn calls(&self, category: InsightCategory) -> usize {
        self.calls.lock().get(&category).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    async fn respond(&self, category: InsightCategory, topic: &str) -> Result<Vec<InsightItem>, BrokerError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let call = {
            let mut calls = self.calls.lock();
            let n = calls.entry(category).or_insert(0);
            *n += 1;
            *n
        };
        let script = self.scripts.lock().get(&category).cloned().unwrap_or(Script::Serve);
        match script {
            Script::Serve => {}
            Script::Fail(err) => return Err(err),
            Script::FailFirst(n, err) if call <= n => return Err(err),
            Script::FailFirst(..) => {}
            Script::Delay(delay) => tokio::time::sleep(delay).await,
        }
        Ok(vec![InsightItem::new(
            format!("{category}: {topic}"),
            format!("scripted {category} content for {topic}"),
            "scripted",
        )
        .with_url(format!("https://docs.example/{category}/{}", topic.replace(' ', "-")))])
    }
}

#[async_trait::async_trait]
impl KnowledgeBroker for ScriptedBroker {
    async fn get_documentation(&self, topic: &str) -> Result<Vec<InsightItem>, BrokerError> {
        self.respond(InsightCategory::Documentation, topic).await
    }

    async fn get_code_examples(&self, topic: &str, _role: AgentRole) -> Result<Vec<InsightItem>, BrokerError> {
        self.respond(InsightCategory::CodeExamples, topic).await
    }

    async fn get_best_practices(&self, topic: &str) -> Result<Vec<InsightItem>, BrokerError> {
        self.respond(InsightCategory::BestPractices, topic).await
    }

    async fn get_troubleshooting_guides(&self, topic: &str) -> Result<Vec<InsightItem>, BrokerError> {
        self.respond(InsightCategory::Troubleshooting, topic).await
    }
}

pub fn test_context() -> BusinessContext {
    BusinessContext::new("proj-test", "fintech")
        .with_tech_stack(["rust", "postgres"])
        .with_team_size(4)
}

/// Three independent-ish phases: design -> build -> verify
pub fn three_phase_workflow(context: BusinessContext) -> Workflow {
    Workflow::new(
        "three-phase",
        vec![
            WorkflowPhase::new("architecture", AgentRole::Architect),
            WorkflowPhase::new("implementation", AgentRole::Developer).with_dependencies(["architecture"]),
            WorkflowPhase::new("testing", AgentRole::Tester).with_dependencies(["implementation"]),
        ],
        context,
    )
}

/// Config with millisecond backoff and no automatic monitoring
pub fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default().with_retry(
        RetryConfig::new()
            .with_max_retries(2)
            .with_delays(Duration::from_millis(1), Duration::from_millis(5))
            .with_circuit_breaker(5, Duration::from_secs(60)),
    );
    config.orchestrator.auto_monitor = false;
    config
}

/// Monitor config with a short period, for paused-time tests
pub fn fast_monitor_config() -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.interval_secs = 1;
    config.quality_check_interval_secs = 1;
    config
}
