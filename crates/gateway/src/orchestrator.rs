//! The in-process orchestrator
//!
//! Owns the query pipeline behind the gateway: semantic-cache read,
//! smart-home control, parallel search with LLM synthesis, direct LLM,
//! and the cache write on the way out. The gateway guards calls into
//! here with the circuit breaker and falls back to the direct LLM path
//! when it trips.

use std::sync::Arc;

use serde_json::json;

use hearth_cache::SemanticCache;
use hearth_core::{Error, Query};
use hearth_home::{PreviousTurn, SmartHomeController};
use hearth_llm::{GenerateOptions, LlmRouter};
use hearth_search::{ParallelSearchEngine, ResultFusion, SearchIntent};

use crate::prerouter;
use crate::session::{SessionManager, Turn};

/// Where an answer came from, for logging and cache decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Cache,
    SmartHome,
    Search,
    Direct,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

pub struct Orchestrator {
    cache: SemanticCache,
    home: Arc<SmartHomeController>,
    search: Arc<ParallelSearchEngine>,
    fusion: ResultFusion,
    llm: Arc<LlmRouter>,
    default_model: String,
    limit_per_provider: usize,
}

impl Orchestrator {
    pub fn new(
        cache: SemanticCache,
        home: Arc<SmartHomeController>,
        search: Arc<ParallelSearchEngine>,
        llm: Arc<LlmRouter>,
        default_model: String,
        limit_per_provider: usize,
    ) -> Self {
        Self {
            cache,
            home,
            search,
            fusion: ResultFusion::default(),
            llm,
            default_model,
            limit_per_provider,
        }
    }

    /// Answer one query through the full pipeline.
    pub async fn answer(
        &self,
        query: &Query,
        sessions: &SessionManager,
    ) -> Result<Answer, Error> {
        let session = query
            .session_id
            .as_deref()
            .or(query.device_id.as_deref())
            .map(|id| sessions.get_or_create(id, query.room.clone()));
        let previous = session
            .as_ref()
            .and_then(|s| s.last_turn())
            .map(|t| PreviousTurn {
                query: t.query,
                response: t.response,
            });

        // Device control short-circuits everything else; control queries
        // are never cached.
        if prerouter::is_control_query(&query.text) {
            let text = self
                .home
                .handle(&query.text, query.room.as_deref(), previous.as_ref())
                .await;
            self.record_turn(&session, query, &text);
            return Ok(Answer {
                text,
                source: AnswerSource::SmartHome,
            });
        }

        if let Some(hit) = self.cache.get(&query.text, None).await {
            if let Some(text) = hit.get("answer").and_then(|v| v.as_str()) {
                self.record_turn(&session, query, text);
                return Ok(Answer {
                    text: text.to_string(),
                    source: AnswerSource::Cache,
                });
            }
        }

        let (intent, results) = self
            .search
            .search(&query.text, None, self.limit_per_provider, false)
            .await;

        let (text, source) = if results.is_empty() {
            (self.direct_answer(query, intent).await?, AnswerSource::Direct)
        } else {
            let fused = self.fusion.top(results, intent, 5);
            if fused.is_empty() {
                (self.direct_answer(query, intent).await?, AnswerSource::Direct)
            } else {
                (
                    self.synthesize(query, intent, &fused).await?,
                    AnswerSource::Search,
                )
            }
        };

        self.cache
            .put(&query.text, json!({ "answer": text }), None)
            .await;
        self.record_turn(&session, query, &text);
        Ok(Answer { text, source })
    }

    /// Plain LLM answer with conversational framing for voice output.
    pub async fn direct_answer(
        &self,
        query: &Query,
        intent: SearchIntent,
    ) -> Result<String, Error> {
        let prompt = format!(
            "You are a helpful voice assistant. Answer briefly in one or two \
             spoken sentences.\n\nQuestion: {}",
            query.text
        );
        let opts = self.options_for(query, intent, "synthesize");
        let generation = self
            .llm
            .generate(&self.default_model, &prompt, &opts)
            .await
            .map_err(hearth_core::Error::from)?;
        Ok(generation.text.trim().to_string())
    }

    async fn synthesize(
        &self,
        query: &Query,
        intent: SearchIntent,
        results: &[hearth_search::SearchResult],
    ) -> Result<String, Error> {
        let context: Vec<serde_json::Value> =
            results.iter().map(|r| r.to_context_value()).collect();
        let prompt = format!(
            "You are a helpful voice assistant. Using only the search results \
             below, answer the question in one or two spoken sentences. If the \
             results don't cover it, say so briefly.\n\nSearch results:\n{}\n\nQuestion: {}",
            serde_json::to_string_pretty(&context).unwrap_or_default(),
            query.text
        );
        let opts = self.options_for(query, intent, "synthesize");
        let generation = self
            .llm
            .generate(&self.default_model, &prompt, &opts)
            .await
            .map_err(hearth_core::Error::from)?;
        Ok(generation.text.trim().to_string())
    }

    fn options_for(&self, query: &Query, intent: SearchIntent, stage: &str) -> GenerateOptions {
        let mut opts = GenerateOptions::default().with_stage(stage);
        opts.temperature = query.temperature;
        opts.max_tokens = query.max_tokens;
        opts.session_id = query.session_id.clone();
        opts.intent = Some(intent.as_str().to_string());
        opts
    }

    fn record_turn(
        &self,
        session: &Option<Arc<crate::session::Session>>,
        query: &Query,
        response: &str,
    ) {
        if let Some(session) = session {
            session.push_turn(Turn {
                query: query.text.clone(),
                response: response.to_string(),
                intent_entities: None,
            });
        }
    }
}
