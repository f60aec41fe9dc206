//! Query and intent types

use serde::{Deserialize, Serialize};

use crate::llm_types::ToolDefinition;

/// Who is asking. Guests get a reduced surface (no memory, no unlock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Owner,
    Guest,
}

/// A natural-language query accepted by the gateway. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Raw query text
    pub text: String,
    /// Session for conversation context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Voice satellite / device identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Room the query originates from, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Owner or guest mode
    #[serde(default)]
    pub mode: QueryMode,
    /// Whether the caller wants a token stream
    #[serde(default)]
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Tools offered to the model, canonical OpenAI shape
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl Query {
    /// Build a plain text query with defaults everywhere else
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            device_id: None,
            room: None,
            mode: QueryMode::Owner,
            streaming: false,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// Closed set of intent categories produced by the pre-router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    Control,
    Weather,
    Sports,
    Events,
    News,
    Dining,
    Stocks,
    Flights,
    Recipes,
    Streaming,
    Directions,
    Time,
    General,
    Memory,
    Conversation,
}

impl IntentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::Control => "control",
            IntentCategory::Weather => "weather",
            IntentCategory::Sports => "sports",
            IntentCategory::Events => "events",
            IntentCategory::News => "news",
            IntentCategory::Dining => "dining",
            IntentCategory::Stocks => "stocks",
            IntentCategory::Flights => "flights",
            IntentCategory::Recipes => "recipes",
            IntentCategory::Streaming => "streaming",
            IntentCategory::Directions => "directions",
            IntentCategory::Time => "time",
            IntentCategory::General => "general",
            IntentCategory::Memory => "memory",
            IntentCategory::Conversation => "conversation",
        }
    }
}

/// Classification output: a category plus confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedIntent {
    pub category: IntentCategory,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let q = Query::new("turn off the lights")
            .with_room("office")
            .with_streaming(true);
        assert_eq!(q.room.as_deref(), Some("office"));
        assert!(q.streaming);
        assert_eq!(q.mode, QueryMode::Owner);
    }

    #[test]
    fn test_intent_category_serde() {
        let json = serde_json::to_string(&IntentCategory::Dining).unwrap();
        assert_eq!(json, "\"dining\"");
        let back: IntentCategory = serde_json::from_str("\"sports\"").unwrap();
        assert_eq!(back, IntentCategory::Sports);
    }
}
