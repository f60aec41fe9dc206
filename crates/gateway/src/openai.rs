//! OpenAI-compatible chat completions
//!
//! `POST /v1/chat/completions` accepting the standard request shape and
//! returning either a full `chat.completion` object or an SSE stream of
//! `chat.completion.chunk` events. Streaming responses lead with the
//! synthetic acknowledgment chunk; no real token is emitted before it.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{sse::Event, IntoResponse, Sse},
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use hearth_core::{Error, Query};
use hearth_llm::{GenerateOptions, TokenChunk};

use crate::ack::pick_acknowledgment;
use crate::error::GatewayError;
use crate::orchestrator::AnswerSource;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Value,
}

/// Admission control shared by both external endpoints: token bucket
/// first, API-key check second.
pub fn admit(state: &AppState, headers: &HeaderMap, rate_limit_enabled: bool) -> Result<(), Error> {
    if rate_limit_enabled && !state.rate_limiter.try_acquire() {
        metrics::counter!("gateway_requests_total", "endpoint" => "chat", "status" => "rate_limited")
            .increment(1);
        return Err(Error::RateLimited);
    }

    if let Some(expected) = &state.settings.server.api_key {
        let presented = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected.as_str()) {
            return Err(Error::Unauthenticated);
        }
    }
    Ok(())
}

pub fn last_user_message(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<axum::response::Response, GatewayError> {
    metrics::counter!("gateway_requests_total", "endpoint" => "chat", "status" => "started")
        .increment(1);

    let rate_limit_enabled = state.rate_limit_enabled().await;
    admit(&state, &headers, rate_limit_enabled)?;

    let user_text = last_user_message(&request.messages)
        .ok_or_else(|| Error::BadRequest("no user message".to_string()))?
        .to_string();

    let room = state
        .rooms
        .detect(headers_device_id(&headers).as_deref().unwrap_or("unknown"))
        .await;
    tracing::info!(room = %room, "detected room for request");

    // Routing hint only: the orchestrator owns tools, so it serves both
    // outcomes; the classifier result is logged for tuning.
    let route_hint = crate::prerouter::is_assistant_query(
        &user_text,
        &state.admin,
        &state.llm,
        &state.settings.llm.intent_model,
    )
    .await;
    tracing::info!(route_hint, "pre-route decision");

    let query = Query {
        text: user_text,
        session_id: None,
        device_id: headers_device_id(&headers),
        room: Some(room),
        mode: Default::default(),
        streaming: request.stream,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        tools: Vec::new(),
    };

    if request.stream {
        metrics::counter!("gateway_requests_total", "endpoint" => "chat", "status" => "streaming")
            .increment(1);
        let stream = chat_stream(state, query, request.model);
        return Ok(Sse::new(stream).into_response());
    }

    let start = std::time::Instant::now();
    let (answer, _was_fallback) = answer_with_fallback(&state, &query).await?;
    metrics::histogram!("gateway_request_duration_seconds", "endpoint" => "chat")
        .record(start.elapsed().as_secs_f64());
    metrics::counter!("gateway_requests_total", "endpoint" => "chat", "status" => "success")
        .increment(1);

    Ok(Json(full_response(&request.messages, &answer, &request.model)).into_response())
}

fn headers_device_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-device-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// The orchestrator path guarded by the circuit breaker, with the direct
/// LLM as fallback. Returns the answer and whether it was a fallback.
pub async fn answer_with_fallback(
    state: &AppState,
    query: &Query,
) -> Result<(String, bool), Error> {
    let breaker_enabled = state.breaker_enabled().await;

    if breaker_enabled && !state.breaker.can_execute() {
        tracing::warn!(
            state = ?state.breaker.state(),
            fallback_reason = "circuit_open",
            "circuit open, using direct llm fallback"
        );
        let text = direct_fallback(state, query).await?;
        return Ok((text, true));
    }

    match state.orchestrator.answer(query, &state.sessions).await {
        Ok(answer) => {
            if breaker_enabled {
                state.breaker.record_success();
            }
            if answer.source == AnswerSource::Cache {
                metrics::counter!("gateway_cache_hits_total").increment(1);
            }
            Ok((answer.text, false))
        }
        Err(err) => {
            tracing::error!(error = %err, "orchestrator failed, using direct llm fallback");
            if breaker_enabled {
                state.breaker.record_failure();
            }
            let text = direct_fallback(state, query).await?;
            Ok((text, true))
        }
    }
}

async fn direct_fallback(state: &AppState, query: &Query) -> Result<String, Error> {
    let prompt = format!(
        "You are a helpful voice assistant. Answer briefly in one or two \
         spoken sentences.\n\nQuestion: {}",
        query.text
    );
    let mut opts = GenerateOptions::default().with_stage("fallback");
    opts.temperature = query.temperature;
    opts.max_tokens = query.max_tokens;

    let generation = state
        .llm
        .generate(&state.settings.llm.default_model, &prompt, &opts)
        .await
        .map_err(Error::from)?;
    Ok(generation.text.trim().to_string())
}

fn full_response(messages: &[ChatMessage], answer: &str, model: &str) -> ChatCompletionResponse {
    let prompt_tokens: usize = messages.iter().map(|m| m.content.split_whitespace().count()).sum();
    let completion_tokens = answer.split_whitespace().count();

    ChatCompletionResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: answer.to_string(),
            },
            finish_reason: "stop".to_string(),
        }],
        usage: json!({
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens,
        }),
    }
}

fn chunk_event(id: &str, model: &str, created: i64, delta: Option<&str>, finish: bool) -> Event {
    let delta_value = match delta {
        Some(content) => json!({"content": content}),
        None => json!({}),
    };
    let chunk = json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": delta_value,
            "finish_reason": if finish { Value::String("stop".into()) } else { Value::Null },
        }],
    });
    Event::default().data(chunk.to_string())
}

/// The SSE stream: acknowledgment chunk first, then real tokens in
/// arrival order, then the terminal marker. The producer runs
/// concurrently and pushes into a bounded channel; a lagging consumer
/// back-pressures it rather than dropping tokens.
fn chat_stream(
    state: Arc<AppState>,
    query: Query,
    model: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());
    let created = chrono::Utc::now().timestamp();

    async_stream::stream! {
        let ack = pick_acknowledgment(&query.text);
        let (tx, mut rx) = mpsc::channel::<TokenChunk>(32);

        // Dispatch the real request first so it overlaps ack emission.
        let producer_state = state.clone();
        let producer_query = query.clone();
        tokio::spawn(async move {
            produce_tokens(producer_state, producer_query, tx).await;
        });

        yield Ok(chunk_event(&id, &model, created, Some(&ack), false));

        while let Some(chunk) = rx.recv().await {
            if chunk.done {
                break;
            }
            if !chunk.token.is_empty() {
                yield Ok(chunk_event(&id, &model, created, Some(&chunk.token), false));
            }
        }

        yield Ok(chunk_event(&id, &model, created, None, true));
        yield Ok(Event::default().data("[DONE]"));
    }
}

/// Producer side of the ack-stream channel. Orchestrator answers arrive
/// as one chunk; circuit-open and failure paths stream the direct LLM.
pub async fn produce_tokens(state: Arc<AppState>, query: Query, tx: mpsc::Sender<TokenChunk>) {
    let breaker_enabled = state.breaker_enabled().await;
    let circuit_open = breaker_enabled && !state.breaker.can_execute();

    if !circuit_open {
        match state.orchestrator.answer(&query, &state.sessions).await {
            Ok(answer) => {
                if breaker_enabled {
                    state.breaker.record_success();
                }
                let _ = tx.send(TokenChunk::token(&answer.text, "orchestrator")).await;
                let _ = tx
                    .send(TokenChunk::terminal("orchestrator", None, None, Default::default()))
                    .await;
                return;
            }
            Err(err) => {
                tracing::error!(error = %err, "orchestrator stream failed, falling back");
                if breaker_enabled {
                    state.breaker.record_failure();
                }
            }
        }
    } else {
        tracing::warn!(fallback_reason = "circuit_open", "streaming via direct llm");
    }

    let prompt = format!(
        "You are a helpful voice assistant. Answer briefly in one or two \
         spoken sentences.\n\nQuestion: {}",
        query.text
    );
    let mut opts = GenerateOptions::default().with_stage("fallback");
    opts.temperature = query.temperature;
    opts.max_tokens = query.max_tokens;

    if let Err(err) = state
        .llm
        .generate_stream(&state.settings.llm.default_model, &prompt, &opts, tx.clone())
        .await
    {
        tracing::error!(error = %err, "direct llm stream failed");
        let _ = tx
            .send(TokenChunk::token(
                crate::responses_api::APOLOGY,
                "gateway",
            ))
            .await;
        let _ = tx
            .send(TokenChunk::terminal("gateway", None, None, Default::default()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_user_message_picks_latest() {
        let messages = vec![
            ChatMessage { role: "system".into(), content: "be brief".into() },
            ChatMessage { role: "user".into(), content: "first".into() },
            ChatMessage { role: "assistant".into(), content: "ok".into() },
            ChatMessage { role: "user".into(), content: "second".into() },
        ];
        assert_eq!(last_user_message(&messages), Some("second"));
    }

    #[test]
    fn test_full_response_shape() {
        let messages = vec![ChatMessage { role: "user".into(), content: "hi there".into() }];
        let response = full_response(&messages, "Hello!", "gpt-4");
        assert_eq!(response.object, "chat.completion");
        assert_eq!(response.choices[0].finish_reason, "stop");
        assert_eq!(response.usage["prompt_tokens"], 2);
        assert_eq!(response.usage["completion_tokens"], 1);
    }

    #[test]
    fn test_chunk_event_shape() {
        let event = chunk_event("chatcmpl-1", "gpt-4", 123, Some("Hel"), false);
        // Event debug contains the serialized payload
        let repr = format!("{event:?}");
        assert!(repr.contains("chat.completion.chunk"));
        assert!(repr.contains("Hel"));
    }
}
