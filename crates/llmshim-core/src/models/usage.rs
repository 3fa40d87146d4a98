//! Token usage reported by a model response

use serde::{Deserialize, Serialize};

/// Token counters extracted from a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: Option<i64>,
    /// Tokens generated
    pub completion_tokens: Option<i64>,
}

impl TokenUsage {
    /// Usage with both counters known
    pub fn new(prompt_tokens: i64, completion_tokens: i64) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
        }
    }

    /// Sum of both counters, only when both are known
    pub fn total_tokens(&self) -> Option<i64> {
        Some(self.prompt_tokens? + self.completion_tokens?)
    }

    /// True when no counter was found
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none() && self.completion_tokens.is_none()
    }

    /// Fill counters missing here from `other`
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens.or(other.prompt_tokens),
            completion_tokens: self.completion_tokens.or(other.completion_tokens),
        }
    }
}
