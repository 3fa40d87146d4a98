//! Per-vendor attribute extraction tables.
//!
//! Every vendor behind Bedrock names the same sampling parameters
//! differently. Request fields are described as JSON pointers, tried in
//! order; response shapes are handled per vendor.

use opentelemetry::KeyValue;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::models::{json_value, Attributes, TokenUsage};
use crate::semconv::{self, LlmRequestType};

/// Key Bedrock adds to the final stream event with billed token counts
const INVOCATION_METRICS: &str = "amazon-bedrock-invocationMetrics";

/// Highest candidate index accepted from a stream event
const MAX_CANDIDATES: usize = 64;

/// A model vendor on Bedrock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vendor {
    /// Claude models
    Anthropic,
    /// Command models
    Cohere,
    /// Jurassic models
    Ai21,
    /// Llama models
    Meta,
    /// Titan models
    Amazon,
    /// Mistral and Mixtral models
    Mistral,
    /// A vendor without an extraction table
    Unknown(String),
}

impl Vendor {
    /// Vendors with an extraction table
    pub const KNOWN: [Vendor; 6] = [
        Vendor::Anthropic,
        Vendor::Cohere,
        Vendor::Ai21,
        Vendor::Meta,
        Vendor::Amazon,
        Vendor::Mistral,
    ];

    /// Map the vendor segment of a model id
    pub fn from_name(name: &str) -> Self {
        match name {
            "anthropic" => Self::Anthropic,
            "cohere" => Self::Cohere,
            "ai21" => Self::Ai21,
            "meta" => Self::Meta,
            "amazon" => Self::Amazon,
            "mistral" => Self::Mistral,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Vendor segment as it appears in model ids
    pub fn as_str(&self) -> &str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Cohere => "cohere",
            Self::Ai21 => "ai21",
            Self::Meta => "meta",
            Self::Amazon => "amazon",
            Self::Mistral => "mistral",
            Self::Unknown(name) => name,
        }
    }

    /// Request field table, `None` for unknown vendors
    pub fn request_fields(&self) -> Option<&'static RequestFields> {
        match self {
            Self::Anthropic => Some(&ANTHROPIC),
            Self::Cohere => Some(&COHERE),
            Self::Ai21 => Some(&AI21),
            Self::Meta => Some(&META),
            Self::Amazon => Some(&AMAZON),
            Self::Mistral => Some(&MISTRAL),
            Self::Unknown(_) => None,
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON pointers locating request parameters in a vendor's body
#[derive(Debug)]
pub struct RequestFields {
    /// Nucleus sampling
    pub top_p: &'static [&'static str],
    /// Temperature
    pub temperature: &'static [&'static str],
    /// Generation limit
    pub max_tokens: &'static [&'static str],
    /// Prompt text
    pub prompt: &'static [&'static str],
}

static COHERE: RequestFields = RequestFields {
    top_p: &["/p"],
    temperature: &["/temperature"],
    max_tokens: &["/max_tokens"],
    prompt: &["/prompt"],
};

static ANTHROPIC: RequestFields = RequestFields {
    top_p: &["/top_p"],
    temperature: &["/temperature"],
    max_tokens: &["/max_tokens_to_sample", "/max_tokens"],
    prompt: &["/prompt"],
};

static AI21: RequestFields = RequestFields {
    top_p: &["/topP"],
    temperature: &["/temperature"],
    max_tokens: &["/maxTokens"],
    prompt: &["/prompt"],
};

static META: RequestFields = RequestFields {
    top_p: &["/top_p"],
    temperature: &["/temperature"],
    max_tokens: &["/max_gen_len"],
    prompt: &["/prompt"],
};

static AMAZON: RequestFields = RequestFields {
    top_p: &["/textGenerationConfig/topP"],
    temperature: &["/textGenerationConfig/temperature"],
    max_tokens: &["/textGenerationConfig/maxTokenCount"],
    prompt: &["/inputText"],
};

static MISTRAL: RequestFields = RequestFields {
    top_p: &["/top_p"],
    temperature: &["/temperature"],
    max_tokens: &["/max_tokens"],
    prompt: &["/prompt"],
};

const DEFAULT_PROMPT: &[&str] = &["/prompt"];

/// One generated candidate
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    /// Generated text
    pub text: Option<String>,
    /// Why generation stopped
    pub finish_reason: Option<String>,
}

fn first<'a>(body: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers
        .iter()
        .filter_map(|p| body.pointer(p))
        .find(|v| !v.is_null())
}

fn text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn array<'a>(body: &'a Value, pointer: &str) -> &'a [Value] {
    body.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Classify the request
pub fn request_type(vendor: &Vendor, model: &str, body: &Value) -> LlmRequestType {
    if model.contains("embed") {
        return LlmRequestType::Embedding;
    }
    if model.contains("rerank") {
        return LlmRequestType::Rerank;
    }
    match vendor {
        Vendor::Anthropic | Vendor::Mistral if body.get("messages").is_some() => LlmRequestType::Chat,
        Vendor::Cohere if body.get("message").is_some() => LlmRequestType::Chat,
        _ => LlmRequestType::Completion,
    }
}

/// Request type and sampling parameters; unknown vendors yield nothing
pub fn request_attributes(vendor: &Vendor, model: &str, body: &Value) -> Attributes {
    let Some(fields) = vendor.request_fields() else {
        return Vec::new();
    };

    let mut attributes = vec![KeyValue::new(
        semconv::LLM_REQUEST_TYPE,
        request_type(vendor, model, body).as_str(),
    )];

    let params = [
        (semconv::LLM_TOP_P, fields.top_p),
        (semconv::LLM_TEMPERATURE, fields.temperature),
        (semconv::LLM_REQUEST_MAX_TOKENS, fields.max_tokens),
    ];
    for (key, pointers) in params {
        if let Some(value) = first(body, pointers).and_then(json_value) {
            attributes.push(KeyValue::new(key, value));
        }
    }
    attributes
}

/// Prompt attributes
pub fn prompt_attributes(vendor: &Vendor, body: &Value) -> Attributes {
    if let Some(messages) = body.get("messages").and_then(Value::as_array) {
        return message_prompts(body, messages);
    }
    if *vendor == Vendor::Cohere {
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            return cohere_chat_prompts(body, message);
        }
    }

    let pointers = vendor.request_fields().map_or(DEFAULT_PROMPT, |f| f.prompt);
    text(first(body, pointers))
        .map(|prompt| vec![KeyValue::new(semconv::prompt_key(0, "user"), prompt)])
        .unwrap_or_default()
}

fn push_message(attributes: &mut Attributes, index: usize, role: &str, content: Option<String>) {
    attributes.push(KeyValue::new(semconv::prompt_key(index, "role"), role.to_string()));
    if let Some(content) = content {
        attributes.push(KeyValue::new(semconv::prompt_key(index, "content"), content));
    }
}

fn message_prompts(body: &Value, messages: &[Value]) -> Attributes {
    let mut attributes = Vec::new();
    let mut index = 0;

    if let Some(system) = body.get("system").and_then(message_text) {
        push_message(&mut attributes, index, "system", Some(system));
        index += 1;
    }

    for message in messages {
        let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
        push_message(&mut attributes, index, role, message.get("content").and_then(message_text));
        index += 1;
    }
    attributes
}

/// Cohere chat: optional preamble, earlier turns, then the new message
fn cohere_chat_prompts(body: &Value, message: &str) -> Attributes {
    let mut attributes = Vec::new();
    let mut index = 0;

    if let Some(preamble) = text(body.get("preamble")) {
        push_message(&mut attributes, index, "system", Some(preamble));
        index += 1;
    }

    for turn in array(body, "/chat_history") {
        let role = match turn.get("role").and_then(Value::as_str) {
            Some("CHATBOT") => "assistant",
            Some("SYSTEM") => "system",
            _ => "user",
        };
        push_message(&mut attributes, index, role, text(turn.get("message")));
        index += 1;
    }

    push_message(&mut attributes, index, "user", Some(message.to_string()));
    attributes
}

/// Text of a message content that is either a string or a list of blocks
fn message_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let joined: String = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            Some(joined)
        }
        _ => None,
    }
}

/// Candidates in a response body
pub fn completions(vendor: &Vendor, body: &Value) -> Vec<Completion> {
    match vendor {
        Vendor::Anthropic => {
            let text = text(body.get("completion")).or_else(|| body.get("content").and_then(message_text));
            vec![Completion {
                text,
                finish_reason: text_field(body, "/stop_reason"),
            }]
        }
        Vendor::Ai21 => array(body, "/completions")
            .iter()
            .map(|c| Completion {
                text: text_field(c, "/data/text"),
                finish_reason: text_field(c, "/finishReason/reason"),
            })
            .collect(),
        Vendor::Meta => vec![Completion {
            text: text_field(body, "/generation"),
            finish_reason: text_field(body, "/stop_reason"),
        }],
        Vendor::Amazon => array(body, "/results")
            .iter()
            .map(|r| Completion {
                text: text_field(r, "/outputText"),
                finish_reason: text_field(r, "/completionReason"),
            })
            .collect(),
        Vendor::Mistral => array(body, "/outputs")
            .iter()
            .map(|o| Completion {
                text: text_field(o, "/text"),
                finish_reason: text_field(o, "/stop_reason"),
            })
            .collect(),
        Vendor::Cohere | Vendor::Unknown(_) => match body.get("generations").and_then(Value::as_array) {
            Some(generations) => generations
                .iter()
                .map(|g| Completion {
                    text: text_field(g, "/text"),
                    finish_reason: text_field(g, "/finish_reason"),
                })
                .collect(),
            // Cohere chat answers with a single top-level text
            None => text_field(body, "/text")
                .map(|text| {
                    vec![Completion {
                        text: Some(text),
                        finish_reason: text_field(body, "/finish_reason"),
                    }]
                })
                .unwrap_or_default(),
        },
    }
}

fn text_field(value: &Value, pointer: &str) -> Option<String> {
    text(value.pointer(pointer))
}

/// Completion attributes
pub fn completion_attributes(vendor: &Vendor, body: &Value) -> Attributes {
    let mut attributes = Vec::new();
    for (i, completion) in completions(vendor, body).into_iter().enumerate() {
        if let Some(text) = completion.text {
            attributes.push(KeyValue::new(semconv::completion_key(i, "content"), text));
        }
        if let Some(reason) = completion.finish_reason {
            attributes.push(KeyValue::new(semconv::completion_key(i, "finish_reason"), reason));
        }
    }
    attributes
}

/// Token counters in a response body
pub fn usage(vendor: &Vendor, body: &Value) -> TokenUsage {
    let int = |pointer: &str| body.pointer(pointer).and_then(Value::as_i64);
    let token_list_len = |value: &Value, pointer: &str| {
        value
            .pointer(pointer)
            .and_then(Value::as_array)
            .and_then(|tokens| i64::try_from(tokens.len()).ok())
    };

    let reported = match vendor {
        Vendor::Anthropic => TokenUsage {
            prompt_tokens: int("/usage/input_tokens"),
            completion_tokens: int("/usage/output_tokens"),
        },
        Vendor::Meta => TokenUsage {
            prompt_tokens: int("/prompt_token_count"),
            completion_tokens: int("/generation_token_count"),
        },
        Vendor::Amazon => {
            let counts: Vec<i64> = array(body, "/results")
                .iter()
                .filter_map(|r| r.get("tokenCount").and_then(Value::as_i64))
                .collect();
            TokenUsage {
                prompt_tokens: int("/inputTextTokenCount"),
                completion_tokens: (!counts.is_empty()).then(|| counts.iter().sum()),
            }
        }
        Vendor::Ai21 => {
            let counts: Vec<i64> = array(body, "/completions")
                .iter()
                .filter_map(|c| token_list_len(c, "/data/tokens"))
                .collect();
            TokenUsage {
                prompt_tokens: token_list_len(body, "/prompt/tokens"),
                completion_tokens: (!counts.is_empty()).then(|| counts.iter().sum()),
            }
        }
        Vendor::Cohere => TokenUsage {
            prompt_tokens: int("/meta/billed_units/input_tokens"),
            completion_tokens: int("/meta/billed_units/output_tokens"),
        },
        Vendor::Mistral | Vendor::Unknown(_) => TokenUsage::default(),
    };

    reported.or(TokenUsage {
        prompt_tokens: body
            .pointer(&format!("/{INVOCATION_METRICS}/inputTokenCount"))
            .and_then(Value::as_i64),
        completion_tokens: body
            .pointer(&format!("/{INVOCATION_METRICS}/outputTokenCount"))
            .and_then(Value::as_i64),
    })
}

/// Model reported by the response body
pub fn response_model(body: &Value) -> Option<String> {
    text(body.get("model"))
}

/// Fold decoded stream events into one body shaped like the vendor's
/// non-streaming response, so the same extraction applies.
pub fn merge_stream_chunks(vendor: &Vendor, chunks: &[Value]) -> Value {
    let mut merged = match vendor {
        Vendor::Anthropic => merge_anthropic(chunks),
        Vendor::Meta => {
            let generation = concat(chunks, "/generation");
            let mut body = json!({ "generation": generation });
            copy_last(&mut body, chunks, &["prompt_token_count", "generation_token_count", "stop_reason"]);
            body
        }
        Vendor::Amazon => {
            let mut result = json!({ "outputText": concat(chunks, "/outputText") });
            if let Some(count) = last(chunks, "/totalOutputTextTokenCount") {
                result["tokenCount"] = count.clone();
            }
            if let Some(reason) = last(chunks, "/completionReason") {
                result["completionReason"] = reason.clone();
            }
            let mut body = json!({ "results": [result] });
            copy_last(&mut body, chunks, &["inputTextTokenCount"]);
            body
        }
        Vendor::Ai21 => indexed_texts(
            chunks,
            IndexedList {
                key: "completions",
                text: "/data/text",
                reason: "finishReason",
            },
            |text| json!({ "data": { "text": text } }),
        ),
        Vendor::Mistral => indexed_texts(
            chunks,
            IndexedList {
                key: "outputs",
                text: "/text",
                reason: "stop_reason",
            },
            |text| json!({ "text": text }),
        ),
        Vendor::Cohere | Vendor::Unknown(_) => merge_cohere(chunks),
    };

    if let Some(metrics) = last(chunks, &format!("/{INVOCATION_METRICS}")) {
        merged[INVOCATION_METRICS] = metrics.clone();
    }
    merged
}

fn concat(chunks: &[Value], pointer: &str) -> String {
    chunks
        .iter()
        .filter_map(|c| c.pointer(pointer).and_then(Value::as_str))
        .collect()
}

fn last<'a>(chunks: &'a [Value], pointer: &str) -> Option<&'a Value> {
    chunks
        .iter()
        .rev()
        .filter_map(|c| c.pointer(pointer))
        .find(|v| !v.is_null())
}

fn copy_last(body: &mut Value, chunks: &[Value], keys: &[&str]) {
    for key in keys {
        if let Some(value) = last(chunks, &format!("/{key}")) {
            body[*key] = value.clone();
        }
    }
}

fn merge_anthropic(chunks: &[Value]) -> Value {
    let mut completion = String::new();
    let mut stop_reason = None;
    let mut usage = Map::new();
    let mut model = None;

    for chunk in chunks {
        match chunk.get("type").and_then(Value::as_str) {
            Some("message_start") => {
                model = chunk.pointer("/message/model").cloned();
                if let Some(Value::Object(start)) = chunk.pointer("/message/usage") {
                    usage.extend(start.clone());
                }
            }
            Some("content_block_delta") => {
                if let Some(text) = chunk.pointer("/delta/text").and_then(Value::as_str) {
                    completion.push_str(text);
                }
            }
            Some("message_delta") => {
                if let Some(reason) = chunk.pointer("/delta/stop_reason") {
                    stop_reason = Some(reason.clone());
                }
                if let Some(Value::Object(delta)) = chunk.get("usage") {
                    usage.extend(delta.clone());
                }
            }
            _ => {
                if let Some(text) = chunk.get("completion").and_then(Value::as_str) {
                    completion.push_str(text);
                }
                if let Some(reason) = chunk.get("stop_reason").filter(|r| !r.is_null()) {
                    stop_reason = Some(reason.clone());
                }
            }
        }
    }

    let mut body = json!({ "completion": completion });
    if let Some(reason) = stop_reason {
        body["stop_reason"] = reason;
    }
    if !usage.is_empty() {
        body["usage"] = Value::Object(usage);
    }
    if let Some(model) = model {
        body["model"] = model;
    }
    body
}

fn merge_cohere(chunks: &[Value]) -> Value {
    let mut texts: Vec<String> = Vec::new();
    let mut reasons: Vec<Option<Value>> = Vec::new();

    let mut push = |index: usize, text: Option<&str>, reason: Option<&Value>| {
        if index >= MAX_CANDIDATES {
            debug!(index, "Ignoring stream event with out-of-range candidate index");
            return;
        }
        if texts.len() <= index {
            texts.resize(index + 1, String::new());
            reasons.resize(index + 1, None);
        }
        if let Some(text) = text {
            texts[index].push_str(text);
        }
        if let Some(reason) = reason.filter(|r| !r.is_null()) {
            reasons[index] = Some(reason.clone());
        }
    };

    for chunk in chunks {
        if let Some(generations) = chunk.get("generations").and_then(Value::as_array) {
            for (i, generation) in generations.iter().enumerate() {
                push(
                    candidate_index(generation, i),
                    generation.get("text").and_then(Value::as_str),
                    generation.get("finish_reason"),
                );
            }
        } else if chunk.get("text").is_some() || chunk.get("finish_reason").is_some() {
            push(
                candidate_index(chunk, 0),
                chunk.get("text").and_then(Value::as_str),
                chunk.get("finish_reason"),
            );
        }
    }

    let generations: Vec<Value> = texts
        .into_iter()
        .zip(reasons)
        .map(|(text, reason)| {
            let mut generation = json!({ "text": text });
            if let Some(reason) = reason {
                generation["finish_reason"] = reason;
            }
            generation
        })
        .collect();
    json!({ "generations": generations })
}

fn candidate_index(event: &Value, fallback: usize) -> usize {
    event
        .get("index")
        .and_then(Value::as_u64)
        .map_or(fallback, |i| usize::try_from(i).unwrap_or(usize::MAX))
}

/// Where a positional candidate list keeps its text and stop reason
struct IndexedList {
    key: &'static str,
    text: &'static str,
    reason: &'static str,
}

fn indexed_texts(chunks: &[Value], list: IndexedList, build: impl Fn(String) -> Value) -> Value {
    let mut candidates: Vec<(String, Option<Value>)> = Vec::new();
    for chunk in chunks {
        for (i, item) in array(chunk, &format!("/{}", list.key)).iter().enumerate() {
            if candidates.len() <= i {
                candidates.resize(i + 1, (String::new(), None));
            }
            if let Some(text) = item.pointer(list.text).and_then(Value::as_str) {
                candidates[i].0.push_str(text);
            }
            if let Some(reason) = item.get(list.reason).filter(|r| !r.is_null()) {
                candidates[i].1 = Some(reason.clone());
            }
        }
    }

    let items = candidates
        .into_iter()
        .map(|(text, reason)| {
            let mut item = build(text);
            if let Some(reason) = reason {
                item[list.reason] = reason;
            }
            item
        })
        .collect();
    let mut body = Map::new();
    body.insert(list.key.to_string(), items);
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::Value as AttrValue;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn attr_map(attributes: Attributes) -> BTreeMap<String, AttrValue> {
        attributes
            .into_iter()
            .map(|kv| (kv.key.as_str().to_string(), kv.value))
            .collect()
    }

    #[rstest]
    #[case::cohere(
        Vendor::Cohere,
        json!({"prompt": "p", "p": 0.9, "temperature": 0.3, "max_tokens": 200})
    )]
    #[case::anthropic(
        Vendor::Anthropic,
        json!({"prompt": "p", "top_p": 0.9, "temperature": 0.3, "max_tokens_to_sample": 200})
    )]
    #[case::ai21(
        Vendor::Ai21,
        json!({"prompt": "p", "topP": 0.9, "temperature": 0.3, "maxTokens": 200})
    )]
    #[case::meta(
        Vendor::Meta,
        json!({"prompt": "p", "top_p": 0.9, "temperature": 0.3, "max_gen_len": 200})
    )]
    #[case::amazon(
        Vendor::Amazon,
        json!({"inputText": "p", "textGenerationConfig": {"topP": 0.9, "temperature": 0.3, "maxTokenCount": 200}})
    )]
    #[case::mistral(
        Vendor::Mistral,
        json!({"prompt": "p", "top_p": 0.9, "temperature": 0.3, "max_tokens": 200})
    )]
    fn test_request_tables(#[case] vendor: Vendor, #[case] body: Value) {
        let attributes = attr_map(request_attributes(&vendor, "some-model", &body));
        assert_eq!(attributes[semconv::LLM_REQUEST_TYPE], AttrValue::from("completion"));
        assert_eq!(attributes[semconv::LLM_TOP_P], AttrValue::F64(0.9));
        assert_eq!(attributes[semconv::LLM_TEMPERATURE], AttrValue::F64(0.3));
        assert_eq!(attributes[semconv::LLM_REQUEST_MAX_TOKENS], AttrValue::I64(200));

        let prompts = attr_map(prompt_attributes(&vendor, &body));
        assert_eq!(prompts["llm.prompts.0.user"], AttrValue::from("p"));
    }

    #[test]
    fn test_missing_parameters_are_skipped() {
        let body = json!({"prompt": "p", "temperature": null});
        let attributes = attr_map(request_attributes(&Vendor::Cohere, "command", &body));
        assert_eq!(attributes.len(), 1);
        assert!(attributes.contains_key(semconv::LLM_REQUEST_TYPE));
    }

    #[test]
    fn test_unknown_vendor_has_no_request_attributes() {
        let body = json!({"prompt": "p", "temperature": 0.1});
        let vendor = Vendor::Unknown("stability".to_string());
        assert!(request_attributes(&vendor, "sdxl", &body).is_empty());
        assert_eq!(prompt_attributes(&vendor, &body).len(), 1);
    }

    #[test]
    fn test_anthropic_max_tokens_fallback_and_chat() {
        let body = json!({
            "anthropic_version": "bedrock-2023-05-31",
            "max_tokens": 512,
            "system": "Be brief.",
            "messages": [
                {"role": "user", "content": [{"type": "text", "text": "Hi"}]},
                {"role": "assistant", "content": "Hello"}
            ]
        });
        let attributes = attr_map(request_attributes(&Vendor::Anthropic, "claude-3-haiku", &body));
        assert_eq!(attributes[semconv::LLM_REQUEST_TYPE], AttrValue::from("chat"));
        assert_eq!(attributes[semconv::LLM_REQUEST_MAX_TOKENS], AttrValue::I64(512));

        let prompts = attr_map(prompt_attributes(&Vendor::Anthropic, &body));
        assert_eq!(prompts["llm.prompts.0.role"], AttrValue::from("system"));
        assert_eq!(prompts["llm.prompts.0.content"], AttrValue::from("Be brief."));
        assert_eq!(prompts["llm.prompts.1.content"], AttrValue::from("Hi"));
        assert_eq!(prompts["llm.prompts.2.role"], AttrValue::from("assistant"));
    }

    #[test]
    fn test_embedding_request_type() {
        let body = json!({"inputText": "hello"});
        assert_eq!(
            request_type(&Vendor::Amazon, "titan-embed-text-v1", &body),
            LlmRequestType::Embedding
        );
    }

    #[test]
    fn test_completion_shapes() {
        let cases = [
            (Vendor::Cohere, json!({"generations": [{"text": "a", "finish_reason": "COMPLETE"}, {"text": "b"}]}), vec!["a", "b"]),
            (Vendor::Anthropic, json!({"completion": "a", "stop_reason": "stop_sequence"}), vec!["a"]),
            (Vendor::Anthropic, json!({"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]}), vec!["ab"]),
            (Vendor::Ai21, json!({"completions": [{"data": {"text": "a"}}]}), vec!["a"]),
            (Vendor::Meta, json!({"generation": "a"}), vec!["a"]),
            (Vendor::Amazon, json!({"results": [{"outputText": "a"}]}), vec!["a"]),
            (Vendor::Mistral, json!({"outputs": [{"text": "a"}]}), vec!["a"]),
        ];
        for (vendor, body, expected) in cases {
            let texts: Vec<String> = completions(&vendor, &body)
                .into_iter()
                .filter_map(|c| c.text)
                .collect();
            assert_eq!(texts, expected, "vendor {vendor}");
        }
    }

    #[test]
    fn test_completion_attributes_include_finish_reason() {
        let body = json!({"generations": [{"text": "a", "finish_reason": "COMPLETE"}]});
        let attributes = attr_map(completion_attributes(&Vendor::Cohere, &body));
        assert_eq!(attributes["llm.completions.0.content"], AttrValue::from("a"));
        assert_eq!(attributes["llm.completions.0.finish_reason"], AttrValue::from("COMPLETE"));
    }

    #[test]
    fn test_usage_extraction() {
        let meta = json!({"generation": "x", "prompt_token_count": 10, "generation_token_count": 5});
        assert_eq!(usage(&Vendor::Meta, &meta), TokenUsage::new(10, 5));

        let amazon = json!({"inputTextTokenCount": 4, "results": [{"tokenCount": 6}, {"tokenCount": 2}]});
        assert_eq!(usage(&Vendor::Amazon, &amazon), TokenUsage::new(4, 8));

        let ai21 = json!({
            "prompt": {"tokens": [{}, {}, {}]},
            "completions": [{"data": {"text": "x", "tokens": [{}, {}]}}]
        });
        assert_eq!(usage(&Vendor::Ai21, &ai21), TokenUsage::new(3, 2));

        let anthropic = json!({"usage": {"input_tokens": 7, "output_tokens": 9}});
        assert_eq!(usage(&Vendor::Anthropic, &anthropic), TokenUsage::new(7, 9));

        assert!(usage(&Vendor::Mistral, &json!({"outputs": []})).is_empty());
    }

    #[test]
    fn test_usage_falls_back_to_invocation_metrics() {
        let body = json!({
            "generations": [{"text": "x"}],
            "amazon-bedrock-invocationMetrics": {"inputTokenCount": 11, "outputTokenCount": 3}
        });
        assert_eq!(usage(&Vendor::Cohere, &body), TokenUsage::new(11, 3));
    }

    #[test]
    fn test_merge_anthropic_messages_stream() {
        let chunks = vec![
            json!({"type": "message_start", "message": {"model": "claude-3-haiku", "usage": {"input_tokens": 12, "output_tokens": 1}}}),
            json!({"type": "content_block_start", "index": 0}),
            json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "Hello"}}),
            json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": " world"}}),
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 5}}),
            json!({"type": "message_stop"}),
        ];
        let merged = merge_stream_chunks(&Vendor::Anthropic, &chunks);
        assert_eq!(merged["completion"], json!("Hello world"));
        assert_eq!(merged["stop_reason"], json!("end_turn"));
        assert_eq!(usage(&Vendor::Anthropic, &merged), TokenUsage::new(12, 5));
        assert_eq!(response_model(&merged).as_deref(), Some("claude-3-haiku"));
    }

    #[test]
    fn test_merge_text_completion_streams() {
        let anthropic = vec![json!({"completion": " Hi", "stop_reason": null}), json!({"completion": "!", "stop_reason": "stop_sequence"})];
        let merged = merge_stream_chunks(&Vendor::Anthropic, &anthropic);
        assert_eq!(merged["completion"], json!(" Hi!"));
        assert_eq!(merged["stop_reason"], json!("stop_sequence"));

        let meta = vec![
            json!({"generation": "Hel", "prompt_token_count": 8, "generation_token_count": 1}),
            json!({"generation": "lo", "prompt_token_count": null, "generation_token_count": 2, "stop_reason": "stop"}),
        ];
        let merged = merge_stream_chunks(&Vendor::Meta, &meta);
        assert_eq!(merged["generation"], json!("Hello"));
        assert_eq!(usage(&Vendor::Meta, &merged), TokenUsage::new(8, 2));

        let amazon = vec![
            json!({"outputText": "Tit", "index": 0, "inputTextTokenCount": 3}),
            json!({"outputText": "an", "index": 0, "totalOutputTextTokenCount": 2, "completionReason": "FINISH"}),
        ];
        let merged = merge_stream_chunks(&Vendor::Amazon, &amazon);
        assert_eq!(completions(&Vendor::Amazon, &merged)[0].text.as_deref(), Some("Titan"));
        assert_eq!(usage(&Vendor::Amazon, &merged), TokenUsage::new(3, 2));
    }

    #[test]
    fn test_merge_cohere_indexed_stream() {
        let chunks = vec![
            json!({"text": "a", "index": 0, "is_finished": false}),
            json!({"text": "x", "index": 1, "is_finished": false}),
            json!({"text": "b", "index": 0, "is_finished": false}),
            json!({"is_finished": true, "finish_reason": "COMPLETE", "index": 0,
                   "amazon-bedrock-invocationMetrics": {"inputTokenCount": 2, "outputTokenCount": 3}}),
        ];
        let merged = merge_stream_chunks(&Vendor::Cohere, &chunks);
        let texts: Vec<_> = completions(&Vendor::Cohere, &merged)
            .into_iter()
            .filter_map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["ab", "x"]);
        assert_eq!(usage(&Vendor::Cohere, &merged), TokenUsage::new(2, 3));
    }

    #[test]
    fn test_merge_mistral_stream() {
        let chunks = vec![
            json!({"outputs": [{"text": "Bon", "stop_reason": null}]}),
            json!({"outputs": [{"text": "jour", "stop_reason": "stop"}]}),
        ];
        let merged = merge_stream_chunks(&Vendor::Mistral, &chunks);
        assert_eq!(merged, json!({"outputs": [{"text": "Bonjour", "stop_reason": "stop"}]}));

        let attributes = attr_map(completion_attributes(&Vendor::Mistral, &merged));
        assert_eq!(attributes["llm.completions.0.content"], AttrValue::from("Bonjour"));
        assert_eq!(attributes["llm.completions.0.finish_reason"], AttrValue::from("stop"));
    }

    #[test]
    fn test_merge_ai21_stream_keeps_finish_reason() {
        let chunks = vec![
            json!({"completions": [{"data": {"text": "Sha"}, "finishReason": null}]}),
            json!({"completions": [{"data": {"text": "lom"}, "finishReason": {"reason": "endoftext"}}]}),
        ];
        let merged = merge_stream_chunks(&Vendor::Ai21, &chunks);
        assert_eq!(
            completions(&Vendor::Ai21, &merged),
            vec![Completion {
                text: Some("Shalom".to_string()),
                finish_reason: Some("endoftext".to_string()),
            }]
        );
    }

    #[rstest]
    #[case::max(u64::MAX)]
    #[case::huge(1_000_000_000)]
    #[case::just_past_limit(64)]
    fn test_merge_cohere_ignores_out_of_range_index(#[case] index: u64) {
        let chunks = vec![
            json!({"text": "ok", "index": 0}),
            json!({"text": "junk", "index": index}),
            json!({"generations": [{"text": "also junk", "index": index}]}),
        ];
        let merged = merge_stream_chunks(&Vendor::Cohere, &chunks);
        assert_eq!(merged, json!({"generations": [{"text": "ok"}]}));
    }

    #[test]
    fn test_cohere_chat_prompt_and_reply() {
        let body = json!({
            "message": "And in French?",
            "preamble": "You translate.",
            "chat_history": [
                {"role": "USER", "message": "Say hello"},
                {"role": "CHATBOT", "message": "Hello"}
            ],
            "temperature": 0.3
        });
        let attributes = attr_map(request_attributes(&Vendor::Cohere, "command-r-v1:0", &body));
        assert_eq!(attributes[semconv::LLM_REQUEST_TYPE], AttrValue::from("chat"));

        let prompts = attr_map(prompt_attributes(&Vendor::Cohere, &body));
        assert_eq!(prompts["llm.prompts.0.role"], AttrValue::from("system"));
        assert_eq!(prompts["llm.prompts.0.content"], AttrValue::from("You translate."));
        assert_eq!(prompts["llm.prompts.1.role"], AttrValue::from("user"));
        assert_eq!(prompts["llm.prompts.2.role"], AttrValue::from("assistant"));
        assert_eq!(prompts["llm.prompts.2.content"], AttrValue::from("Hello"));
        assert_eq!(prompts["llm.prompts.3.role"], AttrValue::from("user"));
        assert_eq!(prompts["llm.prompts.3.content"], AttrValue::from("And in French?"));

        let reply = json!({"text": "Bonjour", "finish_reason": "COMPLETE", "generation_id": "g1"});
        let completion = attr_map(completion_attributes(&Vendor::Cohere, &reply));
        assert_eq!(completion["llm.completions.0.content"], AttrValue::from("Bonjour"));
        assert_eq!(completion["llm.completions.0.finish_reason"], AttrValue::from("COMPLETE"));
    }
}
