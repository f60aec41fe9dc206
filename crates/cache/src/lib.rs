//! Semantic query cache
//!
//! Collapses semantically equivalent queries to one canonical key so a
//! repeated question skips the whole retrieval pipeline. Safety first:
//! category TTLs bound staleness and an explicit never-cache rule set
//! keeps state-changing and context-dependent queries live.

pub mod category;
pub mod location;
pub mod rules;
pub mod key;
pub mod store;

pub use category::{extract_semantic_intent, CacheCategory};
pub use key::{cache_key, LocationOverride};
pub use location::normalize_location;
pub use rules::is_cacheable;
pub use store::{CacheMetadata, CacheStore, CachedEntry, InMemoryCacheStore, SemanticCache};
