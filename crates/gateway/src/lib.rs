//! Hearth gateway
//!
//! The front door of the assistant: translates external chat-completion
//! and responses-style formats into the canonical internal query, applies
//! admission control (token bucket, circuit breaker), detects the
//! speaking room, and streams answers with early acknowledgment.

pub mod ack;
pub mod error;
pub mod http;
pub mod openai;
pub mod orchestrator;
pub mod prerouter;
pub mod responses_api;
pub mod rooms;
pub mod session;
pub mod state;

pub use error::GatewayError;
pub use state::AppState;
