//! LLM semantic-convention attribute names.
//!
//! Indexed attributes are built with [`prompt_key`] and [`completion_key`],
//! e.g. `llm.prompts.0.user` or `llm.completions.1.content`.

use serde::{Deserialize, Serialize};

/// Vendor that served the request (e.g. "anthropic", "sagemaker").
pub const LLM_VENDOR: &str = "llm.vendor";

/// Kind of request, see [`LlmRequestType`].
pub const LLM_REQUEST_TYPE: &str = "llm.request.type";

/// Model requested by the caller.
pub const LLM_REQUEST_MODEL: &str = "llm.request.model";

/// Model reported by the response, when it differs from the request.
pub const LLM_RESPONSE_MODEL: &str = "llm.response.model";

/// Maximum number of tokens to generate.
pub const LLM_REQUEST_MAX_TOKENS: &str = "llm.request.max_tokens";

/// Sampling temperature.
pub const LLM_TEMPERATURE: &str = "llm.temperature";

/// Nucleus sampling threshold.
pub const LLM_TOP_P: &str = "llm.top_p";

/// Tokens consumed by the prompt.
pub const LLM_USAGE_PROMPT_TOKENS: &str = "llm.usage.prompt_tokens";

/// Tokens generated.
pub const LLM_USAGE_COMPLETION_TOKENS: &str = "llm.usage.completion_tokens";

/// Prompt plus completion tokens.
pub const LLM_USAGE_TOTAL_TOKENS: &str = "llm.usage.total_tokens";

/// Estimated cost of the call in USD.
pub const LLM_USAGE_COST_USD: &str = "llm.usage.cost_usd";

/// Prefix for indexed prompt attributes.
pub const LLM_PROMPTS: &str = "llm.prompts";

/// Prefix for indexed completion attributes.
pub const LLM_COMPLETIONS: &str = "llm.completions";

/// Whether the response was streamed.
pub const LLM_IS_STREAMING: &str = "llm.is_streaming";

/// Build `llm.prompts.{index}.{field}`
pub fn prompt_key(index: usize, field: &str) -> String {
    format!("{LLM_PROMPTS}.{index}.{field}")
}

/// Build `llm.completions.{index}.{field}`
pub fn completion_key(index: usize, field: &str) -> String {
    format!("{LLM_COMPLETIONS}.{index}.{field}")
}

/// Values of `llm.request.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmRequestType {
    /// Text completion
    #[default]
    Completion,
    /// Chat / messages API
    Chat,
    /// Embedding generation
    Embedding,
    /// Document reranking
    Rerank,
    /// Anything else
    Unknown,
}

impl LlmRequestType {
    /// Attribute value for this request type
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::Chat => "chat",
            Self::Embedding => "embedding",
            Self::Rerank => "rerank",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for LlmRequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
