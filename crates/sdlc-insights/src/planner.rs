//! Topic planning

use sdlc_core::{AgentRole, BusinessContext, TopicPlan};

/// Derives the topics to query for a phase
pub trait TopicPlanner: Send + Sync {
    /// Plan topics for `phase` executed by `role` in `context`
    fn plan(&self, phase: &str, role: AgentRole, context: &BusinessContext) -> TopicPlan;
}

/// Keyword-driven planner
///
/// Combines phase keywords, role focus areas, the business domain and the
/// tech stack. Output is not truncated; the gatherer applies its own cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTopicPlanner;

impl DefaultTopicPlanner {
    /// Create planner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn phase_topics(phase: &str) -> Vec<String> {
        let phase = phase.to_lowercase();
        let table: &[(&[&str], &[&str])] = &[
            (&["requirement", "discovery"], &["requirements engineering", "user stories"]),
            (&["architect", "design"], &["system design", "architecture patterns"]),
            (&["implement", "develop", "build"], &["coding standards", "code review"]),
            (&["test", "qa", "verif"], &["test automation", "test strategy"]),
            (&["deploy", "release", "ops"], &["continuous delivery", "infrastructure as code"]),
            (&["secur", "threat"], &["threat modeling", "secure coding"]),
            (&["doc"], &["technical writing", "api documentation"]),
        ];
        table
            .iter()
            .find(|(keys, _)| keys.iter().any(|k| phase.contains(k)))
            .map(|(_, topics)| topics.iter().map(|t| (*t).to_string()).collect())
            .unwrap_or_else(|| vec![phase])
    }

    fn role_focus(role: AgentRole) -> &'static str {
        match role {
            AgentRole::ProductManager => "product roadmap",
            AgentRole::BusinessAnalyst => "business process modeling",
            AgentRole::Architect => "design patterns",
            AgentRole::Developer => "idiomatic code",
            AgentRole::Tester => "test cases",
            AgentRole::SecurityEngineer => "vulnerability scanning",
            AgentRole::DevOps => "ci pipelines",
            AgentRole::TechnicalWriter => "documentation style",
        }
    }
}

impl TopicPlanner for DefaultTopicPlanner {
    fn plan(&self, phase: &str, role: AgentRole, context: &BusinessContext) -> TopicPlan {
        let phase_topics = Self::phase_topics(phase);
        let stack: Vec<String> = context.tech_stack.iter().map(|t| t.to_lowercase()).collect();
        let domain = context.domain.to_lowercase();

        let mut documentation = stack.clone();
        documentation.extend(phase_topics.iter().cloned());

        let mut code_examples: Vec<String> = stack
            .iter()
            .map(|t| format!("{t} {}", Self::role_focus(role)))
            .collect();
        code_examples.push(Self::role_focus(role).to_string());

        let mut best_practices: Vec<String> = phase_topics
            .iter()
            .map(|t| format!("{t} best practices"))
            .collect();
        if !domain.is_empty() {
            best_practices.insert(0, format!("{domain} {}", phase_topics[0]));
        }
        best_practices.extend(context.compliance.iter().map(|c| format!("{} compliance", c.to_lowercase())));

        let mut troubleshooting: Vec<String> =
            stack.iter().map(|t| format!("{t} common errors")).collect();
        troubleshooting.push(format!("{} pitfalls", phase_topics[0]));

        TopicPlan {
            documentation,
            code_examples,
            best_practices,
            troubleshooting,
        }
    }
}
