//! Deterministic simulation of an unreliable knowledge broker

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sdlc_core::{AgentRole, BusinessContext, InsightItem, Workflow, WorkflowPhase};
use sdlc_insights::{BrokerError, KnowledgeBroker};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const SOURCE: &str = "simulated";

/// Broker that serves synthetic items and fails at a seeded rate
///
/// Same seed and call order give the same outcomes.
#[derive(Debug)]
pub struct SimulatedBroker {
    rng: Mutex<StdRng>,
    failure_rate: f64,
    max_latency: Duration,
    calls: AtomicU64,
    failures: AtomicU64,
}

impl SimulatedBroker {
    /// Broker failing roughly `failure_rate` of calls (clamped to 0..=1)
    #[must_use]
    pub fn new(seed: u64, failure_rate: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            max_latency: Duration::ZERO,
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Sleep up to `max` before answering
    #[must_use]
    pub fn with_latency(mut self, max: Duration) -> Self {
        self.max_latency = max;
        self
    }

    /// Calls received so far
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Calls answered with an error
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Draw the outcome of one call; the lock is released before any sleep
    fn roll(&self) -> (Option<BrokerError>, usize, Duration) {
        let mut rng = self.rng.lock();
        let error = if rng.random_bool(self.failure_rate) {
            Some(match rng.random_range(0..3) {
                0 => BrokerError::Unavailable("simulated outage".into()),
                1 => BrokerError::RateLimited,
                _ => BrokerError::Timeout(Duration::from_secs(30)),
            })
        } else {
            None
        };
        let count = rng.random_range(1..=3);
        let latency_ms = u64::try_from(self.max_latency.as_millis()).unwrap_or(u64::MAX);
        let latency = if latency_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.random_range(0..=latency_ms))
        };
        (error, count, latency)
    }

    async fn answer(&self, kind: &str, topic: &str) -> Result<Vec<InsightItem>, BrokerError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let (error, count, latency) = self.roll();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = error {
            self.failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(kind, topic, error = %err, "simulated broker failure");
            return Err(err);
        }
        Ok((1..=count)
            .map(|n| {
                InsightItem::new(
                    format!("{topic} {kind} #{n}"),
                    format!("Simulated {kind} for {topic}"),
                    SOURCE,
                )
                .with_relevance(1.0 / n as f64)
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl KnowledgeBroker for SimulatedBroker {
    async fn get_documentation(&self, topic: &str) -> Result<Vec<InsightItem>, BrokerError> {
        self.answer("documentation", topic).await
    }

    async fn get_code_examples(&self, topic: &str, role: AgentRole) -> Result<Vec<InsightItem>, BrokerError> {
        let kind = format!("{role} example");
        self.answer(&kind, topic).await
    }

    async fn get_best_practices(&self, topic: &str) -> Result<Vec<InsightItem>, BrokerError> {
        self.answer("best practice", topic).await
    }

    async fn get_troubleshooting_guides(&self, topic: &str) -> Result<Vec<InsightItem>, BrokerError> {
        self.answer("troubleshooting guide", topic).await
    }
}

/// Requirements through deployment, each phase depending on the previous
#[must_use]
pub fn standard_sdlc_workflow(context: BusinessContext) -> Workflow {
    let name = format!("{} delivery", context.project_id);
    Workflow::new(
        name,
        vec![
            WorkflowPhase::new("requirements", AgentRole::BusinessAnalyst)
                .with_tools(["user story map"]),
            WorkflowPhase::new("architecture", AgentRole::Architect)
                .with_dependencies(["requirements"])
                .with_tools(["c4 model"]),
            WorkflowPhase::new("implementation", AgentRole::Developer)
                .with_dependencies(["architecture"])
                .with_tools(["linter", "formatter"]),
            WorkflowPhase::new("testing", AgentRole::Tester)
                .with_dependencies(["implementation"])
                .with_tools(["test runner", "coverage"]),
            WorkflowPhase::new("deployment", AgentRole::DevOps)
                .with_dependencies(["testing"])
                .with_tools(["ci pipeline"]),
        ],
        context,
    )
}
