//! SDLC Cache - bounded, TTL-aware caches
//!
//! Provides the cache layer that shields the knowledge broker:
//! - [`TtlCache`]: max size, per-entry expiry, LRU eviction, hit/miss counters
//! - [`CacheRegistry`]: one independent cache per data domain, with
//!   aggregated stats and a health verdict for operational tooling
//!
//! Expiry is evaluated against an injected [`sdlc_core::Clock`], so tests
//! advance time instead of sleeping.

#![warn(unreachable_pub)]

pub mod registry;
pub mod ttl;

pub use registry::{CacheDomain, CacheRegistry, RegistryStats};
pub use ttl::{CacheEntry, CacheStats, TtlCache};
