//! Insight gathering with caching, retries and fallback

use crate::broker::{BrokerError, KnowledgeBroker};
use crate::fallback::FallbackLibrary;
use crate::planner::{DefaultTopicPlanner, TopicPlanner};
use futures::future::join_all;
use sdlc_cache::CacheRegistry;
use sdlc_core::{
    AgentRole, BusinessContext, InsightBundle, InsightCategory, InsightConfig, InsightItem,
    SharedClock, TopicPlan,
};
use sdlc_resilience::{RetryError, RetryExecutor};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// How one category of a bundle was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryOutcome {
    /// At least one topic was served by the broker or its cache
    Fetched(Vec<InsightItem>),
    /// Every topic failed; static content substituted
    Fallback {
        /// Fallback items
        items: Vec<InsightItem>,
        /// Why the broker content was unavailable
        reason: String,
    },
}

impl CategoryOutcome {
    /// Items regardless of origin
    #[must_use]
    pub fn into_items(self) -> Vec<InsightItem> {
        match self {
            CategoryOutcome::Fetched(items) | CategoryOutcome::Fallback { items, .. } => items,
        }
    }

    /// Whether fallback content was used
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, CategoryOutcome::Fallback { .. })
    }
}

/// Cache key of a phase bundle
#[must_use]
pub fn bundle_key(phase: &str, role: AgentRole, project_id: &str) -> String {
    format!("bundle:{project_id}:{phase}:{role}")
}

fn plan_key(phase: &str, role: AgentRole, context: &BusinessContext) -> String {
    format!(
        "plan:{phase}:{role}:{}:{}:{}",
        context.domain,
        context.tech_stack.join(","),
        context.compliance.join(",")
    )
}

/// Assembles insight bundles for phases
pub struct InsightGatherer {
    broker: Arc<dyn KnowledgeBroker>,
    planner: Arc<dyn TopicPlanner>,
    fallback: FallbackLibrary,
    caches: Arc<CacheRegistry>,
    retry: Arc<RetryExecutor>,
    config: InsightConfig,
    clock: SharedClock,
}

impl std::fmt::Debug for InsightGatherer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightGatherer")
            .field("fallback_entries", &self.fallback.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InsightGatherer {
    /// Create gatherer with the default planner and fallback library
    #[must_use]
    pub fn new(
        broker: Arc<dyn KnowledgeBroker>,
        caches: Arc<CacheRegistry>,
        retry: Arc<RetryExecutor>,
        config: InsightConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            broker,
            planner: Arc::new(DefaultTopicPlanner::new()),
            fallback: FallbackLibrary::default(),
            caches,
            retry,
            config,
            clock,
        }
    }

    /// Replace the topic planner
    #[must_use]
    pub fn with_planner(mut self, planner: Arc<dyn TopicPlanner>) -> Self {
        self.planner = planner;
        self
    }

    /// Replace the fallback library
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackLibrary) -> Self {
        self.fallback = fallback;
        self
    }

    /// Gather the bundle for a phase
    ///
    /// Cached bundles are returned with `cache_hit = true`. Otherwise every
    /// category is resolved concurrently and the result cached for the
    /// configured bundle TTL.
    pub async fn gather(&self, phase: &str, role: AgentRole, context: &BusinessContext) -> InsightBundle {
        let key = bundle_key(phase, role, &context.project_id);
        if let Some(mut bundle) = self.caches.workflow().get(&key) {
            tracing::debug!(phase, %role, "insight bundle cache hit");
            bundle.cache_hit = true;
            return bundle;
        }

        let plan = self.topic_plan(phase, role, context);
        let outcomes = join_all(
            InsightCategory::ALL
                .iter()
                .map(|category| self.resolve_category(*category, plan.topics(*category), role)),
        )
        .await;

        let mut bundle = InsightBundle::empty(self.clock.now());
        for (category, outcome) in InsightCategory::ALL.into_iter().zip(outcomes) {
            if outcome.is_fallback() {
                bundle.fallback_used = true;
                bundle.fallback_categories.push(category);
            }
            bundle.set_items(category, outcome.into_items());
        }

        tracing::info!(
            phase,
            %role,
            items = bundle.total_items(),
            fallback_used = bundle.fallback_used,
            "insights gathered"
        );
        self.caches
            .workflow()
            .set(key, bundle.clone(), self.config.bundle_ttl());
        bundle
    }

    /// Topic plan for a phase, from cache when possible
    #[must_use]
    pub fn topic_plan(&self, phase: &str, role: AgentRole, context: &BusinessContext) -> TopicPlan {
        let key = plan_key(phase, role, context);
        if let Some(plan) = self.caches.topics().get(&key) {
            return plan;
        }
        let plan = self
            .planner
            .plan(phase, role, context)
            .truncated(self.config.max_topics_per_category);
        self.caches.topics().insert(key, plan.clone());
        plan
    }

    /// Resolve one category across its topics
    pub async fn resolve_category(
        &self,
        category: InsightCategory,
        topics: &[String],
        role: AgentRole,
    ) -> CategoryOutcome {
        if topics.is_empty() {
            return self.fallback_outcome(category, role, "no topics planned".to_string());
        }

        let results = join_all(topics.iter().map(|topic| self.fetch_topic(category, topic, role))).await;

        let mut items = Vec::new();
        let mut failures = Vec::new();
        for (topic, result) in topics.iter().zip(results) {
            match result {
                Ok(fetched) => items.extend(fetched),
                Err(err) => failures.push(format!("{topic}: {err}")),
            }
        }

        if failures.len() == topics.len() {
            return self.fallback_outcome(category, role, failures.join("; "));
        }

        let mut seen = HashSet::new();
        items.retain(|item: &InsightItem| seen.insert(item.title.clone()));
        CategoryOutcome::Fetched(items)
    }

    fn fallback_outcome(&self, category: InsightCategory, role: AgentRole, reason: String) -> CategoryOutcome {
        tracing::warn!(category = %category, %role, reason = %reason, "using fallback insights");
        CategoryOutcome::Fallback {
            items: self.fallback.items(category, role),
            reason,
        }
    }

    async fn fetch_topic(
        &self,
        category: InsightCategory,
        topic: &str,
        role: AgentRole,
    ) -> Result<Vec<InsightItem>, RetryError<BrokerError>> {
        let operation_key = format!("{category}:{topic}");
        // code examples are role-specific; other categories share across roles
        let cache_key = match category {
            InsightCategory::CodeExamples => format!("{operation_key}:{role}"),
            _ => operation_key.clone(),
        };

        if let Some(items) = self.caches.broker().get(&cache_key) {
            tracing::debug!(operation_key = %operation_key, "broker cache hit");
            return Ok(items);
        }

        let timeout = self.config.broker_timeout();
        let items = self
            .retry
            .execute(&operation_key, move || self.call_broker(category, topic, role, timeout))
            .await?;

        self.caches.broker().insert(cache_key, items.clone());
        Ok(items)
    }

    async fn call_broker(
        &self,
        category: InsightCategory,
        topic: &str,
        role: AgentRole,
        timeout: Duration,
    ) -> Result<Vec<InsightItem>, BrokerError> {
        let call = async {
            match category {
                InsightCategory::Documentation => self.broker.get_documentation(topic).await,
                InsightCategory::CodeExamples => self.broker.get_code_examples(topic, role).await,
                InsightCategory::BestPractices => self.broker.get_best_practices(topic).await,
                InsightCategory::Troubleshooting => self.broker.get_troubleshooting_guides(topic).await,
            }
        };
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| BrokerError::Timeout(timeout))?
    }
}
