//! Core types for the pipeline engine
//!
//! Defines the fundamental types shared by every crate:
//! - Workflow and phase definitions with their status machines
//! - Phase and workflow results with aggregated metrics
//! - Progress events emitted while a workflow runs
//! - Quality categories sampled by the monitor

use crate::insight::InsightBundle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ulid::Ulid;

/// Workflow identifier
///
/// Free-form so callers can re-run a workflow under a stable id; fresh ids
/// are ULIDs for sortability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Generate new workflow ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Use a caller-chosen id
    #[inline]
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for WorkflowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role executing a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Product ownership, scope and priorities
    ProductManager,
    /// Requirements elicitation
    BusinessAnalyst,
    /// System and solution architecture
    Architect,
    /// Implementation
    Developer,
    /// Test design and execution
    Tester,
    /// Threat modelling and security review
    SecurityEngineer,
    /// Build, release and operations
    #[serde(rename = "devops")]
    DevOps,
    /// Documentation
    TechnicalWriter,
}

impl AgentRole {
    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::ProductManager => "product_manager",
            AgentRole::BusinessAnalyst => "business_analyst",
            AgentRole::Architect => "architect",
            AgentRole::Developer => "developer",
            AgentRole::Tester => "tester",
            AgentRole::SecurityEngineer => "security_engineer",
            AgentRole::DevOps => "devops",
            AgentRole::TechnicalWriter => "technical_writer",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project context a workflow runs against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessContext {
    /// Project identifier (part of insight cache keys)
    pub project_id: String,
    /// Human-readable project name
    pub project_name: String,
    /// Business domain, e.g. "fintech", "healthcare"
    pub domain: String,
    /// Technologies in use
    pub tech_stack: Vec<String>,
    /// Compliance regimes, e.g. "pci-dss"
    pub compliance: Vec<String>,
    /// Team size
    pub team_size: usize,
    /// Free-form attributes
    pub metadata: HashMap<String, String>,
}

impl BusinessContext {
    /// Create new context
    #[inline]
    #[must_use]
    pub fn new(project_id: impl Into<String>, domain: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            project_name: project_id.clone(),
            project_id,
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// With tech stack
    #[inline]
    #[must_use]
    pub fn with_tech_stack<I, S>(mut self, stack: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tech_stack = stack.into_iter().map(Into::into).collect();
        self
    }

    /// With compliance requirements
    #[inline]
    #[must_use]
    pub fn with_compliance<I, S>(mut self, regimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compliance = regimes.into_iter().map(Into::into).collect();
        self
    }

    /// With team size
    #[inline]
    #[must_use]
    pub fn with_team_size(mut self, size: usize) -> Self {
        self.team_size = size;
        self
    }
}

/// Workflow lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Defined, not started
    Pending,
    /// Phases executing
    Running,
    /// All phases succeeded
    Completed,
    /// A phase failed or the definition was rejected
    Failed,
    /// Externally held between phases
    Paused,
}

impl WorkflowStatus {
    /// Completed or failed
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Phase lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Not started
    Pending,
    /// Executing
    Running,
    /// Succeeded
    Completed,
    /// Failed
    Failed,
}

/// One ordered stage of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowPhase {
    /// Unique name within the workflow
    pub name: String,
    /// Role executing the phase
    pub role: AgentRole,
    /// Tool names available to the phase
    pub tools: Vec<String>,
    /// Names of phases that must complete first
    pub dependencies: Vec<String>,
    /// Current status
    pub status: PhaseStatus,
    /// Start timestamp
    pub started_at: Option<DateTime<Utc>>,
    /// End timestamp
    pub ended_at: Option<DateTime<Utc>>,
    /// Topics recommended by the last gather
    pub recommended_topics: Vec<String>,
}

impl WorkflowPhase {
    /// Create new pending phase
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, role: AgentRole) -> Self {
        Self {
            name: name.into(),
            role,
            tools: Vec::new(),
            dependencies: Vec::new(),
            status: PhaseStatus::Pending,
            started_at: None,
            ended_at: None,
            recommended_topics: Vec::new(),
        }
    }

    /// With tools
    #[inline]
    #[must_use]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// With dependencies
    #[inline]
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Reset runtime fields so the definition can be executed again
    pub fn reset(&mut self) {
        self.status = PhaseStatus::Pending;
        self.started_at = None;
        self.ended_at = None;
        self.recommended_topics.clear();
    }
}

/// A workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Identifier
    pub id: WorkflowId,
    /// Display name
    pub name: String,
    /// Phases in declared execution order
    pub phases: Vec<WorkflowPhase>,
    /// Project context
    pub context: BusinessContext,
    /// Current status
    pub status: WorkflowStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Create new pending workflow with a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>, phases: Vec<WorkflowPhase>, context: BusinessContext) -> Self {
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            phases,
            context,
            status: WorkflowStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// With explicit id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<WorkflowId>) -> Self {
        self.id = id.into();
        self
    }

    /// Find phase by name
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&WorkflowPhase> {
        self.phases.iter().find(|p| p.name == name)
    }
}

impl From<String> for WorkflowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Phase-level quality metrics, each 0-100
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseQualityMetrics {
    /// Weighted aggregate
    pub overall: f64,
    /// Share of insight categories with live (non-fallback) data
    pub insight_coverage: f64,
    /// Documentation volume relative to expectations
    pub documentation_depth: f64,
    /// Best-practice volume relative to expectations
    pub best_practice_alignment: f64,
    /// Broker reliability observed for this phase
    pub integration_reliability: f64,
}

/// Outcome of one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Phase name
    pub phase_name: String,
    /// Role that executed it
    pub role: AgentRole,
    /// Whether the phase succeeded
    pub success: bool,
    /// Produced deliverables
    pub deliverables: Vec<String>,
    /// Quality metrics
    pub quality_metrics: PhaseQualityMetrics,
    /// Wall time in milliseconds
    pub duration_ms: u64,
    /// Gathered insights (absent when the phase failed before gathering)
    pub insights: Option<InsightBundle>,
    /// Problems encountered
    pub issues: Vec<String>,
}

impl PhaseResult {
    /// Failed result carrying a single issue
    #[must_use]
    pub fn failed(
        phase_name: impl Into<String>,
        role: AgentRole,
        issue: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            phase_name: phase_name.into(),
            role,
            success: false,
            deliverables: Vec::new(),
            quality_metrics: PhaseQualityMetrics::default(),
            duration_ms,
            insights: None,
            issues: vec![issue.into()],
        }
    }

    /// Whether the phase had to use fallback content
    #[inline]
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.insights.as_ref().is_some_and(|i| i.fallback_used)
    }
}

/// Business-facing aggregate of a workflow run, each 0-100
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessValueMetrics {
    /// Mean phase quality
    pub quality_score: f64,
    /// Confidence that deliverables are usable
    pub delivery_confidence: f64,
    /// Risk addressed by security/testing phases
    pub risk_reduction: f64,
    /// Share of phases that completed
    pub automation_coverage: f64,
}

/// Engineering-facing aggregate of a workflow run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalMetrics {
    /// Total wall time
    pub total_duration_ms: u64,
    /// Phases that produced a result
    pub phases_executed: usize,
    /// Phases that succeeded
    pub phases_succeeded: usize,
    /// Phases that failed
    pub phases_failed: usize,
    /// Mean overall quality of executed phases
    pub average_phase_quality: f64,
    /// Insight items gathered
    pub insight_items: usize,
    /// Phases served from the bundle cache
    pub cache_hits: usize,
    /// Phases that used fallback content
    pub fallback_phases: usize,
    /// Categories replaced by fallback content, summed over phases
    pub fallback_categories: usize,
}

/// Final result of a workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Workflow id
    pub workflow_id: WorkflowId,
    /// Whether every phase succeeded
    pub success: bool,
    /// Results in execution order
    pub phase_results: Vec<PhaseResult>,
    /// Business aggregate
    pub business_value: BusinessValueMetrics,
    /// Technical aggregate
    pub technical_metrics: TechnicalMetrics,
    /// Workflow-level errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Start timestamp
    pub started_at: DateTime<Utc>,
    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// Workflow started
    Started,
    /// A phase is starting
    PhaseStarted,
    /// A phase completed
    PhaseCompleted,
    /// A phase failed
    PhaseFailed,
    /// Workflow held
    Paused,
    /// Workflow released
    Resumed,
    /// Workflow completed
    Completed,
    /// Workflow failed
    Failed,
}

/// Progress notification for UI/metrics consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Workflow id
    pub workflow_id: WorkflowId,
    /// Event kind
    pub status: ProgressStatus,
    /// Completion percentage, 0-100
    pub progress: f64,
    /// Phase in focus
    pub current_phase: Option<String>,
    /// Emission time
    pub timestamp: DateTime<Utc>,
    /// Extra structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Quality categories sampled by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCategory {
    /// Static code quality
    CodeQuality,
    /// Security posture
    Security,
    /// Dependency health
    Dependencies,
    /// Runtime performance
    Performance,
    /// Test coverage and health
    Testing,
    /// Documentation quality
    Documentation,
    /// Health of external integrations (broker, analyzers)
    ExternalIntegration,
}

impl QualityCategory {
    /// All categories in reporting order
    pub const ALL: [QualityCategory; 7] = [
        QualityCategory::CodeQuality,
        QualityCategory::Security,
        QualityCategory::Dependencies,
        QualityCategory::Performance,
        QualityCategory::Testing,
        QualityCategory::Documentation,
        QualityCategory::ExternalIntegration,
    ];

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityCategory::CodeQuality => "code_quality",
            QualityCategory::Security => "security",
            QualityCategory::Dependencies => "dependencies",
            QualityCategory::Performance => "performance",
            QualityCategory::Testing => "testing",
            QualityCategory::Documentation => "documentation",
            QualityCategory::ExternalIntegration => "external_integration",
        }
    }
}

impl std::fmt::Display for QualityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
