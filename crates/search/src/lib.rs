//! Parallel search engine
//!
//! For intents needing external information: classify, pick the provider
//! set for the intent, fan out under one global deadline, collect the
//! survivors, and optionally fuse the combined results.

pub mod engine;
pub mod fusion;
pub mod intent;
pub mod provider;
pub mod providers;
pub mod result;
pub mod router;

pub use engine::ParallelSearchEngine;
pub use fusion::ResultFusion;
pub use intent::{IntentClassifier, SearchIntent};
pub use provider::SearchProvider;
pub use result::SearchResult;
pub use router::ProviderRouter;

use thiserror::Error;

/// Search provider errors. Individual provider failures are logged and
/// swallowed by the engine; they never fail a batch.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Network(err.to_string())
    }
}
