//! External knowledge broker seam

use sdlc_core::{AgentRole, InsightItem};
use sdlc_resilience::Retryable;
use std::time::Duration;

/// Broker failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Broker unreachable or erroring
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its deadline
    #[error("broker call timed out after {0:?}")]
    Timeout(Duration),

    /// Broker asked us to slow down
    #[error("broker rate limited")]
    RateLimited,

    /// Broker does not know the topic
    #[error("invalid topic: {0}")]
    InvalidTopic(String),
}

impl Retryable for BrokerError {
    fn is_retryable(&self) -> bool {
        !matches!(self, BrokerError::InvalidTopic(_))
    }
}

/// Source of documentation, examples, practices and troubleshooting guides
///
/// Implementations must be cheap to call concurrently; the gatherer fans out
/// one call per (category, topic).
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait KnowledgeBroker: Send + Sync {
    /// Reference documentation for a topic
    async fn get_documentation(&self, topic: &str) -> Result<Vec<InsightItem>, BrokerError>;

    /// Code samples for a topic, tailored to a role
    async fn get_code_examples(
        &self,
        topic: &str,
        role: AgentRole,
    ) -> Result<Vec<InsightItem>, BrokerError>;

    /// Best-practice guidance for a topic
    async fn get_best_practices(&self, topic: &str) -> Result<Vec<InsightItem>, BrokerError>;

    /// Troubleshooting guides for a topic
    async fn get_troubleshooting_guides(&self, topic: &str) -> Result<Vec<InsightItem>, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_topic_is_permanent() {
        assert!(!BrokerError::InvalidTopic("x".into()).is_retryable());
        assert!(BrokerError::Unavailable("down".into()).is_retryable());
        assert!(BrokerError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(BrokerError::RateLimited.is_retryable());
    }
}
