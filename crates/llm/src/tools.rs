//! Tool-schema translation
//!
//! The canonical representation is the OpenAI function-tool shape.
//! Conversions are applied at the provider edge; tool-call responses from
//! any provider are normalised back to the canonical [`ToolCall`].

use serde_json::{json, Value};

use hearth_core::{ToolCall, ToolDefinition};

/// Canonical wire list offered to OpenAI-compatible backends.
pub fn to_openai(tools: &[ToolDefinition]) -> Vec<Value> {
    tools.iter().map(ToolDefinition::to_openai_value).collect()
}

/// Anthropic shape: `{name, description, input_schema}`.
pub fn to_anthropic(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.parameters,
            })
        })
        .collect()
}

/// Google shape: one object holding every declaration:
/// `{function_declarations: [{name, description, parameters}]}`.
pub fn to_google(tools: &[ToolDefinition]) -> Vec<Value> {
    if tools.is_empty() {
        return Vec::new();
    }
    let declarations: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
            })
        })
        .collect();
    vec![json!({ "function_declarations": declarations })]
}

/// Normalise an OpenAI-format tool_calls array (`function.arguments` is a
/// JSON-encoded string) into canonical calls.
pub fn normalize_openai_calls(raw: &[Value]) -> Vec<ToolCall> {
    raw.iter()
        .filter_map(|call| {
            let function = call.get("function")?;
            let name = function.get("name")?.as_str()?.to_string();
            let arguments = match function.get("arguments") {
                // Cloud OpenAI encodes arguments as a string; local
                // ollama-compatible servers may send the object directly.
                Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(json_empty()),
                Some(obj @ Value::Object(_)) => obj.clone(),
                _ => json_empty(),
            };
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            Some(ToolCall { id, name, arguments })
        })
        .collect()
}

/// Normalise Anthropic `tool_use` content blocks.
pub fn normalize_anthropic_calls(content_blocks: &[Value]) -> Vec<ToolCall> {
    content_blocks
        .iter()
        .filter_map(|block| {
            if block.get("type")?.as_str()? != "tool_use" {
                return None;
            }
            Some(ToolCall {
                id: block.get("id")?.as_str()?.to_string(),
                name: block.get("name")?.as_str()?.to_string(),
                arguments: block.get("input").cloned().unwrap_or(json_empty()),
            })
        })
        .collect()
}

/// Normalise Google `functionCall` parts. Google provides no call id, so
/// one is synthesised.
pub fn normalize_google_calls(parts: &[Value]) -> Vec<ToolCall> {
    parts
        .iter()
        .filter_map(|part| {
            let fc = part.get("functionCall")?;
            Some(ToolCall {
                id: format!("google_{}", uuid::Uuid::new_v4().simple()),
                name: fc.get("name")?.as_str()?.to_string(),
                arguments: fc.get("args").cloned().unwrap_or(json_empty()),
            })
        })
        .collect()
}

fn json_empty() -> Value {
    json!({})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tools() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "get_weather",
                "Current weather for a location",
                json!({
                    "type": "object",
                    "properties": {"location": {"type": "string"}},
                    "required": ["location"],
                }),
            ),
            ToolDefinition::new(
                "control_lights",
                "Turn lights on or off",
                json!({
                    "type": "object",
                    "properties": {
                        "room": {"type": "string"},
                        "on": {"type": "boolean"},
                    },
                }),
            ),
        ]
    }

    #[test]
    fn test_anthropic_shape() {
        let converted = to_anthropic(&sample_tools());
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0]["name"], "get_weather");
        assert!(converted[0].get("input_schema").is_some());
        assert!(converted[0].get("parameters").is_none());
    }

    #[test]
    fn test_google_shape_is_one_wrapper() {
        let converted = to_google(&sample_tools());
        assert_eq!(converted.len(), 1);
        let declarations = converted[0]["function_declarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[1]["name"], "control_lights");
    }

    #[test]
    fn test_google_empty_tools_produce_nothing() {
        assert!(to_google(&[]).is_empty());
    }

    // Schema round-trip: convert to each provider format, simulate that
    // provider's tool-call response, normalise back, and verify the same
    // {name, arguments} pair comes out.
    #[test]
    fn test_roundtrip_openai() {
        let args = json!({"location": "Baltimore"});
        let raw = vec![json!({
            "id": "call_1",
            "type": "function",
            "function": {"name": "get_weather", "arguments": args.to_string()},
        })];
        let calls = normalize_openai_calls(&raw);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].arguments, args);
    }

    #[test]
    fn test_roundtrip_openai_object_arguments() {
        // Local ollama-compatible servers send the object un-encoded.
        let raw = vec![json!({
            "function": {"name": "control_lights", "arguments": {"room": "office", "on": false}},
        })];
        let calls = normalize_openai_calls(&raw);
        assert_eq!(calls[0].arguments["room"], "office");
        assert!(!calls[0].id.is_empty());
    }

    #[test]
    fn test_roundtrip_anthropic() {
        let args = json!({"room": "kitchen", "on": true});
        let blocks = vec![
            json!({"type": "text", "text": "Turning them on."}),
            json!({"type": "tool_use", "id": "toolu_1", "name": "control_lights", "input": args}),
        ];
        let calls = normalize_anthropic_calls(&blocks);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "control_lights");
        assert_eq!(calls[0].arguments, args);
    }

    #[test]
    fn test_roundtrip_google() {
        let args = json!({"location": "Philadelphia"});
        let parts = vec![json!({"functionCall": {"name": "get_weather", "args": args}})];
        let calls = normalize_google_calls(&parts);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].arguments, args);
        assert!(calls[0].id.starts_with("google_"));
    }

    #[test]
    fn test_canonical_wire_form_encodes_arguments() {
        let call = ToolCall::new("id1", "get_weather", json!({"location": "Towson"}));
        let wire = call.to_openai_value();
        // Normalising the wire form must give back the identical pair.
        let back = normalize_openai_calls(std::slice::from_ref(&wire));
        assert_eq!(back[0].name, call.name);
        assert_eq!(back[0].arguments, call.arguments);
    }
}
