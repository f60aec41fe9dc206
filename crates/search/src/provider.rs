//! The provider capability
//!
//! Each provider is a value implementing this trait, registered in a map
//! keyed by provider name. Providers raise errors freely; the engine is
//! responsible for swallowing them.

use async_trait::async_trait;

use crate::result::SearchResult;
use crate::SearchError;

/// A web-search provider reachable over HTTP
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name identifier ("ticketmaster", "duckduckgo", ...)
    fn name(&self) -> &'static str;

    /// Execute a search and return normalised results.
    async fn search(
        &self,
        query: &str,
        location: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError>;

    /// Lifecycle hook; providers holding connections release them here.
    async fn close(&self) {}
}
