//! Engine configuration
//!
//! Every section has serde defaults, so a TOML file only needs the values it
//! overrides:
//!
//! ```toml
//! [retry]
//! max_retries = 5
//! circuit_breaker_threshold = 3
//!
//! [monitor]
//! degradation_threshold = 7.5
//! ```

use crate::error::ConfigError;
use crate::types::QualityCategory;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache domains
    pub cache: CacheConfig,
    /// Retry executor and circuit breaker
    pub retry: RetryConfig,
    /// Insight gathering
    pub insights: InsightConfig,
    /// Quality monitor
    pub monitor: MonitorConfig,
    /// Orchestrator
    pub orchestrator: OrchestratorConfig,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text and validate
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With retry section
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// With monitor section
    #[inline]
    #[must_use]
    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// With insights section
    #[inline]
    #[must_use]
    pub fn with_insights(mut self, insights: InsightConfig) -> Self {
        self.insights = insights;
        self
    }

    /// With cache section
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// With orchestrator section
    #[inline]
    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Check value ranges across all sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.retry.validate()?;
        self.insights.validate()?;
        self.monitor.validate()?;
        self.orchestrator.validate()
    }
}

/// Limits for one cache domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCacheConfig {
    /// Maximum entries
    pub max_size: usize,
    /// Default time-to-live in seconds
    pub ttl_secs: u64,
}

impl DomainCacheConfig {
    /// Create domain limits
    #[inline]
    #[must_use]
    pub fn new(max_size: usize, ttl_secs: u64) -> Self {
        Self { max_size, ttl_secs }
    }

    /// Default TTL
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Cache domain configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Workflow-scoped scratch data, including gathered bundles
    pub workflow: DomainCacheConfig,
    /// Per-topic broker responses
    pub broker: DomainCacheConfig,
    /// Derived topic plans
    pub topics: DomainCacheConfig,
    /// Minimum hit rate for a domain to count as healthy
    pub min_hit_rate: f64,
    /// Lookups needed before the hit rate is judged
    pub min_lookups_for_health: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            workflow: DomainCacheConfig::new(200, 600),
            broker: DomainCacheConfig::new(1000, 3600),
            topics: DomainCacheConfig::new(500, 1800),
            min_hit_rate: 0.2,
            min_lookups_for_health: 20,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, domain) in [
            ("cache.workflow.max_size", self.workflow),
            ("cache.broker.max_size", self.broker),
            ("cache.topics.max_size", self.topics),
        ] {
            if domain.max_size == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if !(0.0..=1.0).contains(&self.min_hit_rate) {
            return Err(ConfigError::invalid("cache.min_hit_rate", "must be within 0.0..=1.0"));
        }
        Ok(())
    }
}

/// Retry executor and circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,
    /// Jitter as a fraction of the exponential term
    pub jitter_ratio: f64,
    /// Consecutive failures that open the circuit
    pub circuit_breaker_threshold: u32,
    /// Cooldown before a half-open probe, in milliseconds
    pub circuit_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter_ratio: 0.1,
            circuit_breaker_threshold: 5,
            circuit_timeout_ms: 60_000,
        }
    }
}

impl RetryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max retries
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// With backoff delays
    #[inline]
    #[must_use]
    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self.max_delay_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With jitter ratio
    #[inline]
    #[must_use]
    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    /// With circuit breaker settings
    #[inline]
    #[must_use]
    pub fn with_circuit_breaker(mut self, threshold: u32, timeout: Duration) -> Self {
        self.circuit_breaker_threshold = threshold;
        self.circuit_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Base delay
    #[inline]
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Delay ceiling
    #[inline]
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Circuit cooldown
    #[inline]
    #[must_use]
    pub fn circuit_timeout(&self) -> Duration {
        Duration::from_millis(self.circuit_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::invalid(
                "retry.max_delay_ms",
                "must be >= base_delay_ms",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(ConfigError::invalid("retry.jitter_ratio", "must be within 0.0..=1.0"));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(ConfigError::invalid(
                "retry.circuit_breaker_threshold",
                "must be at least 1",
            ));
        }
        if self.circuit_timeout_ms == 0 {
            return Err(ConfigError::invalid("retry.circuit_timeout_ms", "must be at least 1"));
        }
        Ok(())
    }
}

/// Insight gathering configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Topic cap per category
    pub max_topics_per_category: usize,
    /// Per-call broker timeout in milliseconds
    pub broker_timeout_ms: u64,
    /// TTL of a gathered bundle in seconds
    pub bundle_ttl_secs: u64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            max_topics_per_category: 3,
            broker_timeout_ms: 5000,
            bundle_ttl_secs: 600,
        }
    }
}

impl InsightConfig {
    /// Broker call timeout
    #[inline]
    #[must_use]
    pub fn broker_timeout(&self) -> Duration {
        Duration::from_millis(self.broker_timeout_ms)
    }

    /// Bundle TTL
    #[inline]
    #[must_use]
    pub fn bundle_ttl(&self) -> Duration {
        Duration::from_secs(self.bundle_ttl_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_topics_per_category == 0 {
            return Err(ConfigError::invalid(
                "insights.max_topics_per_category",
                "must be at least 1",
            ));
        }
        if self.broker_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "insights.broker_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Relative weight of each quality category in the overall score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    /// Code quality weight
    pub code_quality: f64,
    /// Security weight
    pub security: f64,
    /// Dependencies weight
    pub dependencies: f64,
    /// Performance weight
    pub performance: f64,
    /// Testing weight
    pub testing: f64,
    /// Documentation weight
    pub documentation: f64,
    /// External integration weight
    pub external_integration: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            code_quality: 0.20,
            security: 0.20,
            dependencies: 0.10,
            performance: 0.15,
            testing: 0.15,
            documentation: 0.10,
            external_integration: 0.10,
        }
    }
}

impl CategoryWeights {
    /// Weight of one category
    #[must_use]
    pub fn weight(&self, category: QualityCategory) -> f64 {
        match category {
            QualityCategory::CodeQuality => self.code_quality,
            QualityCategory::Security => self.security,
            QualityCategory::Dependencies => self.dependencies,
            QualityCategory::Performance => self.performance,
            QualityCategory::Testing => self.testing,
            QualityCategory::Documentation => self.documentation,
            QualityCategory::ExternalIntegration => self.external_integration,
        }
    }

    /// Sum of all weights
    #[must_use]
    pub fn total(&self) -> f64 {
        QualityCategory::ALL.iter().map(|c| self.weight(*c)).sum()
    }
}

/// Quality monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Timer period in seconds
    pub interval_secs: u64,
    /// Minimum spacing between checks in seconds
    pub quality_check_interval_secs: u64,
    /// History entries kept per workflow
    pub history_limit: usize,
    /// Alerts kept per workflow
    pub alert_limit: usize,
    /// Overall drop that raises a degradation alert
    pub degradation_threshold: f64,
    /// Per-category drop named in a degradation alert
    pub category_degradation_threshold: f64,
    /// Overall score below which a warning is raised
    pub warning_threshold: f64,
    /// Category weights
    pub weights: CategoryWeights,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            quality_check_interval_secs: 30,
            history_limit: 100,
            alert_limit: 50,
            degradation_threshold: 10.0,
            category_degradation_threshold: 15.0,
            warning_threshold: 60.0,
            weights: CategoryWeights::default(),
        }
    }
}

impl MonitorConfig {
    /// Timer period
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Debounce window
    #[inline]
    #[must_use]
    pub fn quality_check_interval(&self) -> Duration {
        Duration::from_secs(self.quality_check_interval_secs)
    }

    /// With degradation threshold
    #[inline]
    #[must_use]
    pub fn with_degradation_threshold(mut self, threshold: f64) -> Self {
        self.degradation_threshold = threshold;
        self
    }

    /// With history limit
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::invalid("monitor.interval_secs", "must be at least 1"));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::invalid("monitor.history_limit", "must be at least 1"));
        }
        if self.alert_limit == 0 {
            return Err(ConfigError::invalid("monitor.alert_limit", "must be at least 1"));
        }
        if self.degradation_threshold < 0.0 {
            return Err(ConfigError::invalid(
                "monitor.degradation_threshold",
                "must not be negative",
            ));
        }
        if self.weights.total() <= 0.0 {
            return Err(ConfigError::invalid("monitor.weights", "must sum to a positive value"));
        }
        Ok(())
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Start the quality monitor with every workflow
    pub auto_monitor: bool,
    /// Phases scoring below this fail
    pub min_phase_quality: Option<f64>,
    /// Buffered progress events per subscriber
    pub progress_channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_monitor: true,
            min_phase_quality: None,
            progress_channel_capacity: 256,
        }
    }
}

impl OrchestratorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.progress_channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "orchestrator.progress_channel_capacity",
                "must be at least 1",
            ));
        }
        if let Some(min) = self.min_phase_quality {
            if !(0.0..=100.0).contains(&min) {
                return Err(ConfigError::invalid(
                    "orchestrator.min_phase_quality",
                    "must be within 0..=100",
                ));
            }
        }
        Ok(())
    }
}
