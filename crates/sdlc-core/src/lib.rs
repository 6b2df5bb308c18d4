//! SDLC Core - shared vocabulary of the pipeline engine
//!
//! Everything the other crates agree on lives here:
//! - Workflow, phase and result types
//! - Insight items, topic plans and gathered bundles
//! - Engine configuration (TOML loadable)
//! - The `Clock` abstraction used for TTLs, circuit timeouts and monitoring
//!
//! # Example
//!
//! ```rust
//! use sdlc_core::{AgentRole, BusinessContext, Workflow, WorkflowPhase};
//!
//! let context = BusinessContext::new("proj-1", "fintech");
//! let workflow = Workflow::new(
//!     "payments",
//!     vec![
//!         WorkflowPhase::new("requirements", AgentRole::BusinessAnalyst),
//!         WorkflowPhase::new("architecture", AgentRole::Architect)
//!             .with_dependencies(["requirements"]),
//!     ],
//!     context,
//! );
//! assert_eq!(workflow.phases.len(), 2);
//! ```

#![warn(unreachable_pub)]

pub mod clock;
pub mod config;
pub mod error;
pub mod insight;
pub mod types;

pub use clock::{elapsed_since, system_clock, to_chrono, Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    CacheConfig, CategoryWeights, DomainCacheConfig, EngineConfig, InsightConfig, MonitorConfig,
    OrchestratorConfig, RetryConfig,
};
pub use error::ConfigError;
pub use insight::{InsightBundle, InsightCategory, InsightItem, TopicPlan};
pub use types::{
    AgentRole, BusinessContext, BusinessValueMetrics, PhaseQualityMetrics, PhaseResult,
    PhaseStatus, ProgressEvent, ProgressStatus, QualityCategory, TechnicalMetrics, Workflow,
    WorkflowId, WorkflowPhase, WorkflowResult, WorkflowStatus,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
