//! Insight data gathered from the knowledge broker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of broker content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    /// Reference documentation
    Documentation,
    /// Code samples
    CodeExamples,
    /// Best-practice guidance
    BestPractices,
    /// Troubleshooting guides
    Troubleshooting,
}

impl InsightCategory {
    /// All categories in bundle order
    pub const ALL: [InsightCategory; 4] = [
        InsightCategory::Documentation,
        InsightCategory::CodeExamples,
        InsightCategory::BestPractices,
        InsightCategory::Troubleshooting,
    ];

    /// Stable lowercase name, used as operation-key prefix
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightCategory::Documentation => "documentation",
            InsightCategory::CodeExamples => "code_examples",
            InsightCategory::BestPractices => "best_practices",
            InsightCategory::Troubleshooting => "troubleshooting",
        }
    }
}

impl std::fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of broker content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightItem {
    /// Title
    pub title: String,
    /// Body text
    pub content: String,
    /// Origin ("broker", "fallback", ...)
    pub source: String,
    /// Link, when the broker supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Relevance 0.0-1.0
    pub relevance: f64,
}

impl InsightItem {
    /// Create new item
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source: source.into(),
            url: None,
            relevance: 1.0,
        }
    }

    /// With link
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// With relevance (clamped to 0.0-1.0)
    #[inline]
    #[must_use]
    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = relevance.clamp(0.0, 1.0);
        self
    }
}

/// Topics to query per category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPlan {
    /// Documentation topics
    pub documentation: Vec<String>,
    /// Code-example topics
    pub code_examples: Vec<String>,
    /// Best-practice topics
    pub best_practices: Vec<String>,
    /// Troubleshooting topics
    pub troubleshooting: Vec<String>,
}

impl TopicPlan {
    /// Topics for a category
    #[must_use]
    pub fn topics(&self, category: InsightCategory) -> &[String] {
        match category {
            InsightCategory::Documentation => &self.documentation,
            InsightCategory::CodeExamples => &self.code_examples,
            InsightCategory::BestPractices => &self.best_practices,
            InsightCategory::Troubleshooting => &self.troubleshooting,
        }
    }

    fn topics_mut(&mut self, category: InsightCategory) -> &mut Vec<String> {
        match category {
            InsightCategory::Documentation => &mut self.documentation,
            InsightCategory::CodeExamples => &mut self.code_examples,
            InsightCategory::BestPractices => &mut self.best_practices,
            InsightCategory::Troubleshooting => &mut self.troubleshooting,
        }
    }

    /// Keep at most `max` distinct topics per category, preserving order
    #[must_use]
    pub fn truncated(mut self, max: usize) -> Self {
        for category in InsightCategory::ALL {
            let topics = self.topics_mut(category);
            let mut seen = std::collections::HashSet::new();
            topics.retain(|t| seen.insert(t.clone()));
            topics.truncate(max);
        }
        self
    }

    /// Every distinct topic across categories, in category order
    #[must_use]
    pub fn all_topics(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for category in InsightCategory::ALL {
            for topic in self.topics(category) {
                if !out.contains(topic) {
                    out.push(topic.clone());
                }
            }
        }
        out
    }

    /// True when no category has topics
    #[must_use]
    pub fn is_empty(&self) -> bool {
        InsightCategory::ALL.iter().all(|c| self.topics(*c).is_empty())
    }
}

/// Everything gathered for one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightBundle {
    /// Documentation items
    pub documentation: Vec<InsightItem>,
    /// Code examples
    pub code_examples: Vec<InsightItem>,
    /// Best practices
    pub best_practices: Vec<InsightItem>,
    /// Troubleshooting guides
    pub troubleshooting: Vec<InsightItem>,
    /// Any category used fallback content
    pub fallback_used: bool,
    /// Bundle was served from cache
    pub cache_hit: bool,
    /// Categories replaced by fallback content
    #[serde(default)]
    pub fallback_categories: Vec<InsightCategory>,
    /// When the bundle was assembled
    pub gathered_at: DateTime<Utc>,
}

impl InsightBundle {
    /// Empty bundle stamped at `gathered_at`
    #[must_use]
    pub fn empty(gathered_at: DateTime<Utc>) -> Self {
        Self {
            documentation: Vec::new(),
            code_examples: Vec::new(),
            best_practices: Vec::new(),
            troubleshooting: Vec::new(),
            fallback_used: false,
            cache_hit: false,
            fallback_categories: Vec::new(),
            gathered_at,
        }
    }

    /// Items for a category
    #[must_use]
    pub fn items(&self, category: InsightCategory) -> &[InsightItem] {
        match category {
            InsightCategory::Documentation => &self.documentation,
            InsightCategory::CodeExamples => &self.code_examples,
            InsightCategory::BestPractices => &self.best_practices,
            InsightCategory::Troubleshooting => &self.troubleshooting,
        }
    }

    /// Replace a category's items
    pub fn set_items(&mut self, category: InsightCategory, items: Vec<InsightItem>) {
        match category {
            InsightCategory::Documentation => self.documentation = items,
            InsightCategory::CodeExamples => self.code_examples = items,
            InsightCategory::BestPractices => self.best_practices = items,
            InsightCategory::Troubleshooting => self.troubleshooting = items,
        }
    }

    /// Total items across categories
    #[must_use]
    pub fn total_items(&self) -> usize {
        InsightCategory::ALL.iter().map(|c| self.items(*c).len()).sum()
    }
}
