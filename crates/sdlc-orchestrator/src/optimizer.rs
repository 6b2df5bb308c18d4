//! Workflow definition checks and phase ordering

use crate::error::WorkflowExecutionError;
use sdlc_core::Workflow;
use std::collections::{HashMap, HashSet};

/// Check that a workflow can be executed in declared order
///
/// Requires at least one phase, unique phase names, and dependencies that
/// name phases declared earlier.
///
/// # Errors
/// The first problem found.
pub fn validate_definition(workflow: &Workflow) -> Result<(), WorkflowExecutionError> {
    if workflow.phases.is_empty() {
        return Err(WorkflowExecutionError::Empty(workflow.name.clone()));
    }

    let names: HashSet<&str> = workflow.phases.iter().map(|p| p.name.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    for phase in &workflow.phases {
        if !seen.insert(phase.name.as_str()) {
            return Err(WorkflowExecutionError::DuplicatePhase(phase.name.clone()));
        }
        for dependency in &phase.dependencies {
            if !names.contains(dependency.as_str()) {
                return Err(WorkflowExecutionError::UnknownDependency {
                    phase: phase.name.clone(),
                    dependency: dependency.clone(),
                });
            }
            if !seen.contains(dependency.as_str()) || dependency == &phase.name {
                return Err(WorkflowExecutionError::ForwardDependency {
                    phase: phase.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Proposes phase orders for future runs
///
/// Never touches a running workflow; callers apply the proposal to a new
/// definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseOptimizer;

impl PhaseOptimizer {
    /// Create optimizer
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Dependency-respecting order, stable with respect to declared order
    ///
    /// A phase is placed as soon as all its dependencies are placed; ties
    /// keep declaration order.
    ///
    /// # Errors
    /// Duplicate names, unknown dependencies, or a cycle.
    pub fn propose_order(&self, workflow: &Workflow) -> Result<Vec<String>, WorkflowExecutionError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, phase) in workflow.phases.iter().enumerate() {
            if index.insert(phase.name.as_str(), i).is_some() {
                return Err(WorkflowExecutionError::DuplicatePhase(phase.name.clone()));
            }
        }

        let mut pending: Vec<usize> = vec![0; workflow.phases.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); workflow.phases.len()];
        for (i, phase) in workflow.phases.iter().enumerate() {
            let deps: HashSet<&str> = phase.dependencies.iter().map(String::as_str).collect();
            for dependency in deps {
                let &d = index
                    .get(dependency)
                    .ok_or_else(|| WorkflowExecutionError::UnknownDependency {
                        phase: phase.name.clone(),
                        dependency: dependency.to_string(),
                    })?;
                pending[i] += 1;
                dependents[d].push(i);
            }
        }

        let mut placed = vec![false; workflow.phases.len()];
        let mut order = Vec::with_capacity(workflow.phases.len());
        // lowest declared index among ready phases goes first
        while let Some(next) = (0..workflow.phases.len()).find(|&i| !placed[i] && pending[i] == 0) {
            placed[next] = true;
            order.push(workflow.phases[next].name.clone());
            for &dependent in &dependents[next] {
                pending[dependent] -= 1;
            }
        }

        if order.len() < workflow.phases.len() {
            let stuck = workflow
                .phases
                .iter()
                .zip(&placed)
                .filter(|(_, placed)| !**placed)
                .map(|(p, _)| p.name.clone())
                .collect();
            return Err(WorkflowExecutionError::Cycle(stuck));
        }
        Ok(order)
    }

    /// Copy of `workflow` with phases in the proposed order and reset
    ///
    /// # Errors
    /// See [`Self::propose_order`].
    pub fn reordered(&self, workflow: &Workflow) -> Result<Workflow, WorkflowExecutionError> {
        let order = self.propose_order(workflow)?;
        let mut phases = Vec::with_capacity(order.len());
        for name in &order {
            if let Some(phase) = workflow.phase(name) {
                let mut phase = phase.clone();
                phase.reset();
                phases.push(phase);
            }
        }
        Ok(Workflow::new(workflow.name.clone(), phases, workflow.context.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdlc_core::{AgentRole, BusinessContext, WorkflowPhase};

    fn workflow(phases: Vec<WorkflowPhase>) -> Workflow {
        Workflow::new("wf", phases, BusinessContext::new("p", "d"))
    }

    fn phase(name: &str, deps: &[&str]) -> WorkflowPhase {
        WorkflowPhase::new(name, AgentRole::Developer).with_dependencies(deps.iter().copied())
    }

    #[test]
    fn valid_definition_passes() {
        let wf = workflow(vec![phase("a", &[]), phase("b", &["a"]), phase("c", &["a", "b"])]);
        assert!(validate_definition(&wf).is_ok());
    }

    #[test]
    fn rejects_bad_definitions() {
        assert!(matches!(
            validate_definition(&workflow(vec![])),
            Err(WorkflowExecutionError::Empty(_))
        ));
        assert!(matches!(
            validate_definition(&workflow(vec![phase("a", &[]), phase("a", &[])])),
            Err(WorkflowExecutionError::DuplicatePhase(_))
        ));
        assert!(matches!(
            validate_definition(&workflow(vec![phase("a", &["zzz"])])),
            Err(WorkflowExecutionError::UnknownDependency { .. })
        ));
        assert!(matches!(
            validate_definition(&workflow(vec![phase("a", &["b"]), phase("b", &[])])),
            Err(WorkflowExecutionError::ForwardDependency { .. })
        ));
        assert!(matches!(
            validate_definition(&workflow(vec![phase("a", &["a"])])),
            Err(WorkflowExecutionError::ForwardDependency { .. })
        ));
    }

    #[test]
    fn proposal_moves_dependencies_first() {
        let wf = workflow(vec![
            phase("testing", &["implementation"]),
            phase("requirements", &[]),
            phase("implementation", &["requirements"]),
            phase("docs", &[]),
        ]);

        let order = PhaseOptimizer::new().propose_order(&wf).unwrap();

        assert_eq!(order, vec!["requirements", "implementation", "testing", "docs"]);
    }

    #[test]
    fn proposal_is_stable_for_valid_order() {
        let wf = workflow(vec![phase("a", &[]), phase("b", &[]), phase("c", &["a"])]);
        assert_eq!(PhaseOptimizer::new().propose_order(&wf).unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_is_reported() {
        let wf = workflow(vec![phase("a", &["b"]), phase("b", &["a"]), phase("c", &[])]);
        let err = PhaseOptimizer::new().propose_order(&wf).unwrap_err();
        assert_eq!(err, WorkflowExecutionError::Cycle(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn reordered_workflow_validates() {
        let wf = workflow(vec![phase("b", &["a"]), phase("a", &[])]);
        let fixed = PhaseOptimizer::new().reordered(&wf).unwrap();
        assert!(validate_definition(&fixed).is_ok());
        assert_ne!(fixed.id, wf.id);
    }
}
