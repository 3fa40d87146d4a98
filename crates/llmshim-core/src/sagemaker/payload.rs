//! Attribute extraction for SageMaker endpoint payloads.
//!
//! Endpoints serve arbitrary containers; the text-generation containers
//! share a loose shape: `{"inputs": ..., "parameters": {...}}` in,
//! `[{"generated_text": ...}]` or `{"generated_text": ...}` out, and
//! `{"token": {"text": ...}}` lines when streaming.

use opentelemetry::KeyValue;
use serde_json::{json, Value};

use crate::body::decode_json_lines;
use crate::models::{json_value, Attributes, TokenUsage};
use crate::semconv::{self, LlmRequestType};

const TOP_P: &[&str] = &["/parameters/top_p", "/top_p"];
const TEMPERATURE: &[&str] = &["/parameters/temperature", "/temperature"];
const MAX_TOKENS: &[&str] = &[
    "/parameters/max_new_tokens",
    "/parameters/max_tokens",
    "/max_new_tokens",
    "/max_tokens",
];

fn first<'a>(body: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers
        .iter()
        .filter_map(|p| body.pointer(p))
        .find(|v| !v.is_null())
}

/// Request type and sampling parameters
pub fn request_attributes(body: &Value) -> Attributes {
    let request_type = if body.get("messages").is_some() {
        LlmRequestType::Chat
    } else {
        LlmRequestType::Completion
    };
    let mut attributes = vec![KeyValue::new(semconv::LLM_REQUEST_TYPE, request_type.as_str())];

    for (key, pointers) in [
        (semconv::LLM_TOP_P, TOP_P),
        (semconv::LLM_TEMPERATURE, TEMPERATURE),
        (semconv::LLM_REQUEST_MAX_TOKENS, MAX_TOKENS),
    ] {
        if let Some(value) = first(body, pointers).and_then(json_value) {
            attributes.push(KeyValue::new(key, value));
        }
    }
    attributes
}

/// Prompt attributes; a body that is not JSON is recorded verbatim
pub fn prompt_attributes(body: Option<&Value>, raw: &[u8]) -> Attributes {
    let prompt = match body {
        Some(body) => {
            if let Some(messages) = body.get("messages").and_then(Value::as_array) {
                return messages
                    .iter()
                    .enumerate()
                    .flat_map(|(i, message)| {
                        let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
                        let content = message.get("content").and_then(Value::as_str);
                        let mut attributes =
                            vec![KeyValue::new(semconv::prompt_key(i, "role"), role.to_string())];
                        if let Some(content) = content {
                            attributes.push(KeyValue::new(
                                semconv::prompt_key(i, "content"),
                                content.to_string(),
                            ));
                        }
                        attributes
                    })
                    .collect();
            }
            first(body, &["/inputs", "/prompt", "/text_inputs"])
                .and_then(Value::as_str)
                .map(str::to_string)
        }
        None => Some(String::from_utf8_lossy(raw).into_owned()),
    };

    prompt
        .map(|p| vec![KeyValue::new(semconv::prompt_key(0, "user"), p)])
        .unwrap_or_default()
}

/// Generated texts in a response body
pub fn completions(body: &Value) -> Vec<String> {
    let from_item = |item: &Value| -> Option<String> {
        item.get("generated_text")
            .or_else(|| item.pointer("/message/content"))
            .or_else(|| item.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    match body {
        Value::Array(items) => items.iter().filter_map(from_item).collect(),
        Value::Object(_) => {
            if let Some(choices) = body.get("choices").and_then(Value::as_array) {
                return choices.iter().filter_map(from_item).collect();
            }
            from_item(body).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

/// Completion attributes
pub fn completion_attributes(body: &Value) -> Attributes {
    completions(body)
        .into_iter()
        .enumerate()
        .map(|(i, text)| KeyValue::new(semconv::completion_key(i, "content"), text))
        .collect()
}

/// Token counters reported by the container, if any
pub fn usage(body: &Value) -> TokenUsage {
    let int = |pointer: &str| body.pointer(pointer).and_then(Value::as_i64);
    let details = if body.is_array() { "/0/details" } else { "/details" };

    TokenUsage {
        prompt_tokens: int("/usage/prompt_tokens"),
        completion_tokens: int("/usage/completion_tokens"),
    }
    .or(TokenUsage {
        prompt_tokens: body
            .pointer(&format!("{details}/prefill"))
            .and_then(Value::as_array)
            .and_then(|p| i64::try_from(p.len()).ok())
            .filter(|n| *n > 0),
        completion_tokens: int(&format!("{details}/generated_tokens")),
    })
}

/// Fold a streamed response into one body.
///
/// Token events are concatenated into `generated_text`; a stream that
/// carried a single JSON document is returned as that document.
pub fn merge_stream(bytes: &[u8]) -> Option<Value> {
    let values = decode_json_lines(bytes);
    let tokens: Vec<&str> = values
        .iter()
        .filter_map(|v| v.pointer("/token/text").and_then(Value::as_str))
        .collect();

    if tokens.is_empty() {
        return values.into_iter().last();
    }

    let mut merged = json!({ "generated_text": tokens.concat() });
    if let Some(details) = values.iter().rev().find_map(|v| v.get("details").filter(|d| !d.is_null())) {
        merged["details"] = details.clone();
    }
    Some(merged)
}
