//! SDLC Orchestrator - sequential phase execution with live quality tracking
//!
//! [`WorkflowOrchestrator`] wires the workspace together:
//! - a [`PhaseRunner`] (by default the [`PhaseExecutor`]) runs one phase at a time
//! - insight gathering goes through the shared caches and retry executor
//! - the quality monitor samples published snapshots while the workflow runs
//! - progress is broadcast as [`sdlc_core::ProgressEvent`]s
//!
//! ```no_run
//! use sdlc_core::{system_clock, BusinessContext, EngineConfig};
//! use sdlc_orchestrator::{standard_sdlc_workflow, SimulatedBroker, WorkflowOrchestrator};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let broker = Arc::new(SimulatedBroker::new(42, 0.1));
//! let orchestrator = WorkflowOrchestrator::new(EngineConfig::default(), broker, system_clock());
//! let context = BusinessContext::new("shop", "ecommerce");
//! let result = orchestrator
//!     .execute_workflow(standard_sdlc_workflow(context.clone()), context)
//!     .await;
//! println!("success: {}", result.success);
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod orchestrator;
pub mod phase;
pub mod simulation;

pub use error::{PhaseExecutionError, WorkflowExecutionError};
pub use metrics::{business_value, technical_metrics};
pub use optimizer::{validate_definition, PhaseOptimizer};
pub use orchestrator::WorkflowOrchestrator;
pub use phase::{deliverables_for, phase_quality, PhaseExecutor, PhaseRunner, EXPECTED_ITEMS_PER_CATEGORY};
pub use simulation::{standard_sdlc_workflow, SimulatedBroker};
