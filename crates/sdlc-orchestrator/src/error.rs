//! Error types for workflow orchestration
//!
//! Neither error escapes the orchestrator: phase errors become failed
//! `PhaseResult`s and workflow errors become failed `WorkflowResult`s.

use sdlc_core::{PhaseStatus, WorkflowId};

/// Phase-level failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhaseExecutionError {
    /// A dependency has not completed
    #[error("phase `{phase}` depends on `{dependency}` which is {status:?}")]
    DependencyNotMet {
        /// Phase being executed
        phase: String,
        /// Dependency name
        dependency: String,
        /// Dependency status
        status: PhaseStatus,
    },

    /// A dependency is not part of the workflow
    #[error("phase `{phase}` depends on unknown phase `{dependency}`")]
    UnknownDependency {
        /// Phase being executed
        phase: String,
        /// Dependency name
        dependency: String,
    },

    /// Quality below the configured gate
    #[error("phase `{phase}` quality {score:.1} below minimum {minimum:.1}")]
    QualityGate {
        /// Phase name
        phase: String,
        /// Observed overall quality
        score: f64,
        /// Configured minimum
        minimum: f64,
    },
}

/// Workflow-level failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowExecutionError {
    /// No phases
    #[error("workflow `{0}` has no phases")]
    Empty(String),

    /// Two phases share a name
    #[error("duplicate phase name `{0}`")]
    DuplicatePhase(String),

    /// Dependency names a phase that does not exist
    #[error("phase `{phase}` depends on unknown phase `{dependency}`")]
    UnknownDependency {
        /// Declaring phase
        phase: String,
        /// Missing dependency
        dependency: String,
    },

    /// Dependency is declared after the phase that needs it
    #[error("phase `{phase}` depends on later phase `{dependency}`")]
    ForwardDependency {
        /// Declaring phase
        phase: String,
        /// Dependency declared later
        dependency: String,
    },

    /// Dependencies form a cycle
    #[error("dependency cycle involving {0:?}")]
    Cycle(Vec<String>),

    /// Same workflow id is already executing
    #[error("workflow {0} is already running")]
    AlreadyRunning(WorkflowId),
}
