//! Domain-partitioned cache registry
//!
//! Access patterns and staleness tolerance differ per domain, so each gets
//! its own [`TtlCache`] with its own limits: broker responses tolerate longer
//! staleness than workflow-scoped scratch data.

use crate::ttl::{CacheStats, TtlCache};
use sdlc_core::{CacheConfig, InsightBundle, InsightItem, SharedClock, TopicPlan};
use serde::Serialize;
use std::str::FromStr;

/// Data domains with independent caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDomain {
    /// Workflow-scoped data, including gathered insight bundles
    Workflow,
    /// Per-topic broker responses
    Broker,
    /// Derived topic plans
    Topics,
}

impl CacheDomain {
    /// All domains
    pub const ALL: [CacheDomain; 3] = [CacheDomain::Workflow, CacheDomain::Broker, CacheDomain::Topics];

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheDomain::Workflow => "workflow",
            CacheDomain::Broker => "broker",
            CacheDomain::Topics => "topics",
        }
    }
}

impl std::fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(Self::Workflow),
            "broker" => Ok(Self::Broker),
            "topics" => Ok(Self::Topics),
            other => Err(format!("unknown cache domain: {other}")),
        }
    }
}

/// Stats for every domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    /// Workflow domain
    pub workflow: CacheStats,
    /// Broker domain
    pub broker: CacheStats,
    /// Topics domain
    pub topics: CacheStats,
}

impl RegistryStats {
    /// Stats of one domain
    #[must_use]
    pub fn domain(&self, domain: CacheDomain) -> &CacheStats {
        match domain {
            CacheDomain::Workflow => &self.workflow,
            CacheDomain::Broker => &self.broker,
            CacheDomain::Topics => &self.topics,
        }
    }

    /// Entries across domains
    #[must_use]
    pub fn total_entries(&self) -> usize {
        self.workflow.entries + self.broker.entries + self.topics.entries
    }

    /// Hit rate across all lookups
    #[must_use]
    pub fn overall_hit_rate(&self) -> f64 {
        let hits = self.workflow.hits + self.broker.hits + self.topics.hits;
        let lookups = self.workflow.lookups() + self.broker.lookups() + self.topics.lookups();
        if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        }
    }
}

/// Owner of the per-domain caches
#[derive(Debug)]
pub struct CacheRegistry {
    workflow: TtlCache<InsightBundle>,
    broker: TtlCache<Vec<InsightItem>>,
    topics: TtlCache<TopicPlan>,
    min_hit_rate: f64,
    min_lookups_for_health: u64,
}

impl CacheRegistry {
    /// Create registry from configuration
    #[must_use]
    pub fn new(config: &CacheConfig, clock: SharedClock) -> Self {
        Self {
            workflow: TtlCache::new(
                CacheDomain::Workflow.as_str(),
                config.workflow.max_size,
                config.workflow.ttl(),
                clock.clone(),
            ),
            broker: TtlCache::new(
                CacheDomain::Broker.as_str(),
                config.broker.max_size,
                config.broker.ttl(),
                clock.clone(),
            ),
            topics: TtlCache::new(
                CacheDomain::Topics.as_str(),
                config.topics.max_size,
                config.topics.ttl(),
                clock,
            ),
            min_hit_rate: config.min_hit_rate,
            min_lookups_for_health: config.min_lookups_for_health,
        }
    }

    /// Workflow-scoped cache (insight bundles)
    #[inline]
    #[must_use]
    pub fn workflow(&self) -> &TtlCache<InsightBundle> {
        &self.workflow
    }

    /// Broker response cache
    #[inline]
    #[must_use]
    pub fn broker(&self) -> &TtlCache<Vec<InsightItem>> {
        &self.broker
    }

    /// Topic plan cache
    #[inline]
    #[must_use]
    pub fn topics(&self) -> &TtlCache<TopicPlan> {
        &self.topics
    }

    /// Stats for every domain
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            workflow: self.workflow.stats(),
            broker: self.broker.stats(),
            topics: self.topics.stats(),
        }
    }

    /// Health verdict
    ///
    /// A domain is unhealthy when it sits at capacity while its hit rate,
    /// measured over enough lookups, is below the configured minimum.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        let stats = self.stats();
        CacheDomain::ALL.iter().all(|d| {
            let s = stats.domain(*d);
            let full = s.entries >= s.max_size;
            let judged = s.lookups() >= self.min_lookups_for_health;
            !(full && judged && s.hit_rate < self.min_hit_rate)
        })
    }

    /// Clear one domain
    pub fn clear(&self, domain: CacheDomain) {
        tracing::info!(domain = %domain, "clearing cache domain");
        match domain {
            CacheDomain::Workflow => self.workflow.clear(),
            CacheDomain::Broker => self.broker.clear(),
            CacheDomain::Topics => self.topics.clear(),
        }
    }

    /// Clear every domain
    pub fn clear_all(&self) {
        for domain in CacheDomain::ALL {
            self.clear(domain);
        }
    }

    /// Sweep expired entries from every domain
    pub fn purge_expired(&self) -> usize {
        self.workflow.purge_expired() + self.broker.purge_expired() + self.topics.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sdlc_core::{DomainCacheConfig, ManualClock};
    use std::time::Duration;

    fn registry(clock: &ManualClock) -> CacheRegistry {
        let config = CacheConfig {
            workflow: DomainCacheConfig::new(2, 10),
            broker: DomainCacheConfig::new(2, 100),
            topics: DomainCacheConfig::new(2, 50),
            min_hit_rate: 0.5,
            min_lookups_for_health: 4,
        };
        CacheRegistry::new(&config, clock.shared())
    }

    #[test]
    fn domains_are_independent() {
        let clock = ManualClock::starting_now();
        let registry = registry(&clock);
        registry.workflow().insert("k", InsightBundle::empty(Utc::now()));
        registry.broker().insert("k", vec![InsightItem::new("t", "c", "broker")]);

        registry.clear(CacheDomain::Workflow);

        assert_eq!(registry.workflow().size(), 0);
        assert_eq!(registry.broker().size(), 1);
    }

    #[test]
    fn domains_use_their_own_ttl() {
        let clock = ManualClock::starting_now();
        let registry = registry(&clock);
        registry.workflow().insert("k", InsightBundle::empty(Utc::now()));
        registry.broker().insert("k", Vec::new());

        clock.advance(Duration::from_secs(11));

        assert!(registry.workflow().get("k").is_none());
        assert!(registry.broker().get("k").is_some());
    }

    #[test]
    fn full_cold_cache_is_unhealthy() {
        let clock = ManualClock::starting_now();
        let registry = registry(&clock);
        registry.topics().insert("a", TopicPlan::default());
        registry.topics().insert("b", TopicPlan::default());
        for key in ["x", "y", "z", "w"] {
            registry.topics().get(key);
        }
        assert!(!registry.is_healthy());

        registry.clear(CacheDomain::Topics);
        assert!(registry.is_healthy());
    }

    #[test]
    fn fresh_registry_is_healthy() {
        let clock = ManualClock::starting_now();
        assert!(registry(&clock).is_healthy());
    }

    #[test]
    fn domain_parses_from_str() {
        assert_eq!("broker".parse::<CacheDomain>(), Ok(CacheDomain::Broker));
        assert!("nope".parse::<CacheDomain>().is_err());
    }

    #[test]
    fn overall_hit_rate_spans_domains() {
        let clock = ManualClock::starting_now();
        let registry = registry(&clock);
        registry.broker().insert("k", Vec::new());
        registry.broker().get("k");
        registry.topics().get("missing");
        assert_eq!(registry.stats().overall_hit_rate(), 0.5);
    }
}
