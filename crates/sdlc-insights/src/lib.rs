//! SDLC Insights - knowledge gathering for pipeline phases
//!
//! The [`InsightGatherer`] assembles an [`sdlc_core::InsightBundle`] for a
//! phase from an external [`KnowledgeBroker`]:
//! - topics come from a pluggable [`TopicPlanner`]
//! - every broker call goes through the retry executor and a per-call timeout
//! - bundles, topic plans and per-topic responses are cached by domain
//! - a category whose topics all fail is filled from the [`FallbackLibrary`]
//!
//! Broker trouble degrades content; it never fails the gather.

#![warn(unreachable_pub)]

pub mod broker;
pub mod fallback;
pub mod gatherer;
pub mod planner;

pub use broker::{BrokerError, KnowledgeBroker};
pub use fallback::{FallbackLibrary, FALLBACK_SOURCE};
pub use gatherer::{bundle_key, CategoryOutcome, InsightGatherer};
pub use planner::{DefaultTopicPlanner, TopicPlanner};
