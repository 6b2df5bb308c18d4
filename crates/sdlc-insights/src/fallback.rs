//! Static fallback content used when the broker cannot serve a category

use sdlc_core::{AgentRole, InsightCategory, InsightItem};

/// Source tag on every fallback item
pub const FALLBACK_SOURCE: &str = "fallback";

#[derive(Debug, Clone)]
struct FallbackEntry {
    category: InsightCategory,
    role: Option<AgentRole>,
    item: InsightItem,
}

/// Local substitute content keyed by category, optionally role-specific
#[derive(Debug, Clone)]
pub struct FallbackLibrary {
    entries: Vec<FallbackEntry>,
}

impl FallbackLibrary {
    /// Library with no entries
    #[must_use]
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add an entry; `role = None` applies to every role
    #[must_use]
    pub fn with_entry(mut self, category: InsightCategory, role: Option<AgentRole>, item: InsightItem) -> Self {
        self.entries.push(FallbackEntry { category, role, item });
        self
    }

    /// Fallback items for a category as seen by `role`
    ///
    /// Generic entries come first, followed by entries for the role.
    #[must_use]
    pub fn items(&self, category: InsightCategory, role: AgentRole) -> Vec<InsightItem> {
        let generic = self
            .entries
            .iter()
            .filter(|e| e.category == category && e.role.is_none());
        let specific = self
            .entries
            .iter()
            .filter(|e| e.category == category && e.role == Some(role));
        generic.chain(specific).map(|e| e.item.clone()).collect()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the library has no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn item(title: &str, content: &str) -> InsightItem {
    InsightItem::new(title, content, FALLBACK_SOURCE).with_relevance(0.5)
}

impl Default for FallbackLibrary {
    fn default() -> Self {
        use InsightCategory::*;

        Self::empty()
            .with_entry(
                Documentation,
                None,
                item(
                    "Project documentation baseline",
                    "Keep a README, an architecture overview and API reference up to date with each change.",
                ),
            )
            .with_entry(
                Documentation,
                None,
                item(
                    "Decision records",
                    "Record significant technical decisions with context, options considered and consequences.",
                ),
            )
            .with_entry(
                CodeExamples,
                None,
                item(
                    "Small, tested increments",
                    "Prefer small functions with a focused unit test alongside each behaviour change.",
                ),
            )
            .with_entry(
                CodeExamples,
                Some(AgentRole::Tester),
                item(
                    "Arrange-act-assert",
                    "Structure tests as setup, a single action, then assertions on observable behaviour.",
                ),
            )
            .with_entry(
                CodeExamples,
                Some(AgentRole::DevOps),
                item(
                    "Pipeline as code",
                    "Declare build, test and deploy stages in version-controlled pipeline definitions.",
                ),
            )
            .with_entry(
                BestPractices,
                None,
                item(
                    "Review before merge",
                    "Every change gets a peer review and passes automated checks before it lands.",
                ),
            )
            .with_entry(
                BestPractices,
                None,
                item(
                    "Least privilege",
                    "Grant services and people only the access their task needs.",
                ),
            )
            .with_entry(
                BestPractices,
                Some(AgentRole::SecurityEngineer),
                item(
                    "Threat model early",
                    "Enumerate assets, entry points and trust boundaries before implementation starts.",
                ),
            )
            .with_entry(
                Troubleshooting,
                None,
                item(
                    "Reproduce first",
                    "Capture a minimal reproduction and the exact environment before changing code.",
                ),
            )
            .with_entry(
                Troubleshooting,
                None,
                item(
                    "Check recent changes",
                    "Bisect recent commits and configuration changes when a regression appears.",
                ),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_covers_every_category() {
        let library = FallbackLibrary::default();
        for category in InsightCategory::ALL {
            assert!(!library.items(category, AgentRole::Developer).is_empty());
        }
    }

    #[test]
    fn role_entries_follow_generic_ones() {
        let library = FallbackLibrary::default();
        let tester = library.items(InsightCategory::CodeExamples, AgentRole::Tester);
        let developer = library.items(InsightCategory::CodeExamples, AgentRole::Developer);

        assert_eq!(tester.len(), developer.len() + 1);
        assert_eq!(tester[0], developer[0]);
        assert_eq!(tester.last().map(|i| i.title.as_str()), Some("Arrange-act-assert"));
    }

    #[test]
    fn items_are_tagged_as_fallback() {
        let library = FallbackLibrary::default();
        assert!(library
            .items(InsightCategory::Troubleshooting, AgentRole::Architect)
            .iter()
            .all(|i| i.source == FALLBACK_SOURCE));
    }
}
