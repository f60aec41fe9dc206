//! Shared error taxonomy
//!
//! Every component maps its failures onto this closed set so callers can
//! branch on the kind instead of matching strings.

use thiserror::Error;

/// Control-plane error kinds
#[derive(Error, Debug)]
pub enum Error {
    /// Token bucket rejected the request. Surfaced as 429, never retried.
    #[error("rate limit exceeded")]
    RateLimited,

    /// API key check enabled and failed. Surfaced as 401.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Circuit breaker is open for the orchestrator path.
    #[error("circuit open, orchestrator unavailable")]
    CircuitOpen,

    /// Provider returned 5xx or an I/O failure occurred.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Provider returned 4xx (including auth failures).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Cloud credentials missing or the provider is disabled.
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// LLM output was not valid JSON where structured output was expected.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// Per-call or global deadline expired.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A never-cache rule matched. Internal, not surfaced to callers.
    #[error("query is not cacheable")]
    CacheSkip,

    /// Configuration invalid or unavailable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Session management failure.
    #[error("session error: {0}")]
    Session(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a single jittered retry is allowed for this kind.
    ///
    /// Only transient, idempotent classes qualify; 4xx and admission
    /// rejections are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Upstream(_) | Error::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::Upstream("500".into()).is_retryable());
        assert!(Error::Timeout("generate".into()).is_retryable());
        assert!(!Error::RateLimited.is_retryable());
        assert!(!Error::BadRequest("401".into()).is_retryable());
        assert!(!Error::ProviderNotConfigured("openai".into()).is_retryable());
    }
}
