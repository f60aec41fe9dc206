//! Responses-style API
//!
//! `POST /v1/responses` in both framings. The streaming form emits, in
//! order: `response.created`, `response.output_item.added`,
//! `response.content_part.added`, one or more `response.output_text.delta`,
//! `response.output_text.done`, `response.content_part.done`,
//! `response.output_item.done`, `response.done`. Clients depend on this
//! sequence exactly, including the done events that repeat their
//! predecessors' payloads. The first text delta is always the
//! acknowledgment.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{sse::Event, IntoResponse, Sse},
    Json,
};
use futures::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use hearth_core::{Error, Query};
use hearth_llm::TokenChunk;

use crate::ack::pick_acknowledgment;
use crate::error::GatewayError;
use crate::openai::{admit, answer_with_fallback, produce_tokens};
use crate::state::AppState;

/// Fixed speech-safe apology when every path fails.
pub const APOLOGY: &str =
    "Sorry, I'm having trouble with that right now. Please try again in a moment.";

#[derive(Debug, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Value,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

/// Flatten the `input` field (string or message list) into user text.
fn extract_user_text(input: &Value) -> Option<String> {
    match input {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => {
            let mut last_user = None;
            for item in items {
                let role = item.get("role").and_then(Value::as_str).unwrap_or("user");
                if role != "user" {
                    continue;
                }
                let content = match item.get("content") {
                    Some(Value::String(text)) => Some(text.clone()),
                    Some(Value::Array(parts)) => {
                        let text: Vec<&str> = parts
                            .iter()
                            .filter(|p| p.get("type").and_then(Value::as_str) == Some("text")
                                || p.get("type").and_then(Value::as_str) == Some("input_text"))
                            .filter_map(|p| p.get("text").and_then(Value::as_str))
                            .collect();
                        (!text.is_empty()).then(|| text.join(" "))
                    }
                    _ => None,
                };
                if content.is_some() {
                    last_user = content;
                }
            }
            last_user
        }
        _ => None,
    }
}

pub async fn responses(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ResponsesRequest>,
) -> Result<axum::response::Response, GatewayError> {
    metrics::counter!("gateway_requests_total", "endpoint" => "responses", "status" => "started")
        .increment(1);

    let rate_limit_enabled = state.rate_limit_enabled().await;
    admit(&state, &headers, rate_limit_enabled)?;

    let user_text = extract_user_text(&request.input)
        .ok_or_else(|| Error::BadRequest("no user input".to_string()))?;

    let room = state.rooms.detect("unknown").await;
    tracing::info!(room = %room, stream = request.stream, "responses api request");

    let query = Query {
        text: user_text,
        session_id: None,
        device_id: None,
        room: Some(room),
        mode: Default::default(),
        streaming: request.stream,
        temperature: request.temperature,
        max_tokens: request.max_output_tokens,
        tools: Vec::new(),
    };

    if request.stream {
        let ack = pick_acknowledgment(&query.text);
        let (tx, rx) = mpsc::channel::<TokenChunk>(32);
        let producer_state = state.clone();
        let producer_query = query.clone();
        tokio::spawn(async move {
            produce_tokens(producer_state, producer_query, tx).await;
        });
        return Ok(Sse::new(response_event_stream(ack, rx)).into_response());
    }

    let (answer, _) = answer_with_fallback(&state, &query).await?;
    let response_id = format!("resp_{}", uuid::Uuid::new_v4().simple());
    let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());

    Ok(Json(json!({
        "id": response_id,
        "object": "response",
        "created_at": chrono::Utc::now().timestamp(),
        "status": "completed",
        "model": request.model,
        "output": [{
            "type": "message",
            "id": message_id,
            "status": "completed",
            "role": "assistant",
            "content": [{"type": "output_text", "text": answer}],
        }],
        "output_text": answer,
    }))
    .into_response())
}

/// SSE framing over the event sequence.
pub fn response_event_stream(
    ack: String,
    rx: mpsc::Receiver<TokenChunk>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    use futures::StreamExt;
    response_event_values(ack, rx).map(|payload| Ok(sse(payload)))
}

/// The prescribed event sequence over a token channel, as raw payloads.
/// The first `output_text.delta` is the ack, always.
pub fn response_event_values(
    ack: String,
    mut rx: mpsc::Receiver<TokenChunk>,
) -> impl Stream<Item = Value> {
    let response_id = format!("resp_{}", uuid::Uuid::new_v4().simple());
    let item_id = format!("item_{}", uuid::Uuid::new_v4().simple());

    async_stream::stream! {
        let mut full_text = String::new();

        yield json!({
            "type": "response.created",
            "response": {
                "id": response_id,
                "object": "response",
                "status": "in_progress",
                "output": [],
            },
        });

        yield json!({
            "type": "response.output_item.added",
            "output_index": 0,
            "item": {"id": item_id, "type": "message", "role": "assistant", "content": []},
        });

        yield json!({
            "type": "response.content_part.added",
            "item_id": item_id,
            "output_index": 0,
            "content_index": 0,
            "part": {"type": "output_text", "text": ""},
        });

        // Acknowledgment precedes every real token.
        full_text.push_str(&ack);
        yield json!({
            "type": "response.output_text.delta",
            "item_id": item_id,
            "output_index": 0,
            "content_index": 0,
            "delta": ack,
        });

        while let Some(chunk) = rx.recv().await {
            if chunk.done {
                break;
            }
            if chunk.token.is_empty() {
                continue;
            }
            full_text.push_str(&chunk.token);
            yield json!({
                "type": "response.output_text.delta",
                "item_id": item_id,
                "output_index": 0,
                "content_index": 0,
                "delta": chunk.token,
            });
        }

        yield json!({
            "type": "response.output_text.done",
            "item_id": item_id,
            "output_index": 0,
            "content_index": 0,
            "text": full_text,
        });

        // Deliberately repeats the text payload; clients expect it.
        yield json!({
            "type": "response.content_part.done",
            "item_id": item_id,
            "output_index": 0,
            "content_index": 0,
            "part": {"type": "output_text", "text": full_text},
        });

        yield json!({
            "type": "response.output_item.done",
            "output_index": 0,
            "item": {
                "id": item_id,
                "type": "message",
                "role": "assistant",
                "content": [{"type": "output_text", "text": full_text}],
            },
        });

        yield json!({
            "type": "response.done",
            "response": {
                "id": response_id,
                "object": "response",
                "status": "completed",
                "output": [{
                    "id": item_id,
                    "type": "message",
                    "role": "assistant",
                    "content": [{"type": "output_text", "text": full_text}],
                }],
            },
        });
    }
}

fn sse(payload: Value) -> Event {
    Event::default().data(payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_event_order_is_exact() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(TokenChunk::token("It's ", "ollama")).await.unwrap();
        tx.send(TokenChunk::token("sunny.", "ollama")).await.unwrap();
        tx.send(TokenChunk::terminal("ollama", None, Some(2), Default::default()))
            .await
            .unwrap();
        drop(tx);

        let payloads: Vec<Value> = response_event_values("Checking the weather.".into(), rx)
            .collect()
            .await;
        let types: Vec<&str> = payloads
            .iter()
            .map(|p| p["type"].as_str().unwrap())
            .collect();

        assert_eq!(
            types,
            vec![
                "response.created",
                "response.output_item.added",
                "response.content_part.added",
                "response.output_text.delta",
                "response.output_text.delta",
                "response.output_text.delta",
                "response.output_text.done",
                "response.content_part.done",
                "response.output_item.done",
                "response.done",
            ]
        );
    }

    #[tokio::test]
    async fn test_ack_precedes_real_tokens() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(TokenChunk::token("real answer", "ollama")).await.unwrap();
        tx.send(TokenChunk::terminal("ollama", None, Some(2), Default::default()))
            .await
            .unwrap();
        drop(tx);

        let payloads: Vec<Value> = response_event_values("On it.".into(), rx).collect().await;

        let first_delta = payloads
            .iter()
            .find(|p| p["type"] == "response.output_text.delta")
            .unwrap();
        assert_eq!(first_delta["delta"], "On it.");

        // Full text accumulates ack plus real tokens, and the done events
        // repeat it verbatim.
        let text_done = payloads
            .iter()
            .find(|p| p["type"] == "response.output_text.done")
            .unwrap();
        assert_eq!(text_done["text"], "On it.real answer");
        let part_done = payloads
            .iter()
            .find(|p| p["type"] == "response.content_part.done")
            .unwrap();
        assert_eq!(part_done["part"]["text"], "On it.real answer");
    }

    #[test]
    fn test_input_extraction_variants() {
        assert_eq!(
            extract_user_text(&json!("turn on the lights")).as_deref(),
            Some("turn on the lights")
        );
        assert_eq!(
            extract_user_text(&json!([
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "what's the weather"}
            ]))
            .as_deref(),
            Some("what's the weather")
        );
        assert_eq!(
            extract_user_text(&json!([
                {"role": "user", "content": [{"type": "input_text", "text": "hello there"}]}
            ]))
            .as_deref(),
            Some("hello there")
        );
        assert!(extract_user_text(&json!(42)).is_none());
    }
}
