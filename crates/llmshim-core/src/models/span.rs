//! Reading LLM attributes back from exported spans

use opentelemetry::Value;
use opentelemetry_sdk::trace::SpanData;

use crate::semconv;

/// LLM semantic-convention accessors for a finished span
pub trait LlmSpanExt {
    /// Look up an attribute
    fn attribute(&self, key: &str) -> Option<&Value>;

    /// String attribute, if recorded as a string
    fn str_attribute(&self, key: &str) -> Option<&str> {
        match self.attribute(key)? {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Integer attribute, if recorded as an integer
    fn int_attribute(&self, key: &str) -> Option<i64> {
        match self.attribute(key)? {
            Value::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Requested model, if recorded
    fn model_name(&self) -> Option<&str> {
        self.str_attribute(semconv::LLM_REQUEST_MODEL)
    }

    /// Vendor, if recorded
    fn vendor(&self) -> Option<&str> {
        self.str_attribute(semconv::LLM_VENDOR)
    }

    /// Check if this span represents an LLM call
    fn is_llm_call(&self) -> bool {
        self.model_name().is_some()
    }

    /// Prompt tokens, if recorded
    fn tokens_in(&self) -> Option<i64> {
        self.int_attribute(semconv::LLM_USAGE_PROMPT_TOKENS)
    }

    /// Completion tokens, if recorded
    fn tokens_out(&self) -> Option<i64> {
        self.int_attribute(semconv::LLM_USAGE_COMPLETION_TOKENS)
    }

    /// Get total tokens used
    fn total_tokens(&self) -> i64 {
        self.tokens_in().unwrap_or(0) + self.tokens_out().unwrap_or(0)
    }

    /// Completions recorded on the span, in index order
    fn completions(&self) -> Vec<&str> {
        (0..)
            .map_while(|i| {
                let key = semconv::completion_key(i, "content");
                self.str_attribute(&key)
            })
            .collect()
    }
}

impl LlmSpanExt for SpanData {
    fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{Span as _, Tracer as _, TracerProvider as _};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

    fn finished_span(attributes: Vec<KeyValue>) -> SpanData {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let mut span = provider.tracer("test").start("bedrock.completion");
        span.set_attributes(attributes);
        span.end();
        exporter.get_finished_spans().unwrap().remove(0)
    }

    #[test]
    fn test_token_totals() {
        assert_eq!(finished_span(Vec::new()).total_tokens(), 0);

        let span = finished_span(vec![
            KeyValue::new(semconv::LLM_USAGE_PROMPT_TOKENS, 12_i64),
            KeyValue::new(semconv::LLM_USAGE_COMPLETION_TOKENS, 30_i64),
        ]);
        assert_eq!(span.total_tokens(), 42);
    }

    #[test]
    fn test_completions_stop_at_gap() {
        let span = finished_span(vec![
            KeyValue::new(semconv::completion_key(0, "content"), "a"),
            KeyValue::new(semconv::completion_key(1, "content"), "b"),
            KeyValue::new(semconv::completion_key(3, "content"), "d"),
        ]);
        assert_eq!(span.completions(), vec!["a", "b"]);
    }

    #[test]
    fn test_llm_call_detection() {
        let span = finished_span(vec![
            KeyValue::new(semconv::LLM_VENDOR, "cohere"),
            KeyValue::new(semconv::LLM_REQUEST_MODEL, "command-text-v14"),
        ]);
        assert!(span.is_llm_call());
        assert_eq!(span.vendor(), Some("cohere"));
        assert!(!finished_span(Vec::new()).is_llm_call());
    }
}
