//! Core traits and types for the hearth control plane
//!
//! This crate provides foundational types used across all other crates:
//! - Query and intent-category types
//! - Chat/LLM message types (messages, tool definitions, tool calls)
//! - Usage records for cloud cost accounting
//! - Error taxonomy shared by every component
//! - Resilience primitives (token bucket, circuit breaker)

pub mod error;
pub mod query;
pub mod llm_types;
pub mod usage;
pub mod circuit_breaker;
pub mod rate_limit;

pub use error::{Error, Result};
pub use query::{IntentCategory, Query, QueryMode};
pub use llm_types::{
    FinishReason, Message, Role, StreamChunk, TokenUsage, ToolCall, ToolDefinition,
};
pub use usage::UsageRecord;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStatus, CircuitState};
pub use rate_limit::{TokenBucket, TokenBucketStatus};
