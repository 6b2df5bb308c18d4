//! Monitor errors

use sdlc_core::{QualityCategory, WorkflowId};

/// Reasons a quality check could not run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MonitorError {
    /// No monitoring state exists for the workflow
    #[error("workflow {0} is not monitored")]
    NotMonitored(WorkflowId),

    /// Nothing has been published for the workflow yet
    #[error("no snapshot published for workflow {0}")]
    NoSnapshot(WorkflowId),

    /// A scorer failed; the check is skipped
    #[error("{category} scorer failed: {message}")]
    Scorer {
        /// Category being scored
        category: QualityCategory,
        /// Failure detail
        message: String,
    },
}
