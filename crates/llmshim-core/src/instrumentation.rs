//! State shared by every instrumented client created by one instrumentor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{InstrumentationScope, KeyValue, Value};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};

use crate::config::InstrumentationConfig;
use crate::context;
use crate::cost::CostCalculator;
use crate::instrumentor::VERSION;
use crate::models::{Attributes, TokenUsage};
use crate::semconv;
use crate::tracer::LlmSpan;

/// How a call's model name is matched against the pricing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PriceLookup<'a> {
    /// Bedrock model names: exact, prefix or substring match
    Family(&'a str),
    /// Names chosen by the caller, e.g. endpoint names: exact match only
    Exact(&'a str),
}

/// Tracer, settings and on/off switch behind instrumented clients.
///
/// Clones share the switch, so `uninstrument()` on the owner turns every
/// wrapper it handed out into a pass-through.
#[derive(Debug, Clone)]
pub struct Instrumentation {
    tracer: SdkTracer,
    scope_name: &'static str,
    config: Arc<InstrumentationConfig>,
    enabled: Arc<AtomicBool>,
    pricing: Arc<CostCalculator>,
}

impl Instrumentation {
    /// Create a disabled instrumentation handle with its own tracer scope
    pub fn new(
        provider: &SdkTracerProvider,
        scope_name: &'static str,
        config: InstrumentationConfig,
    ) -> Self {
        let scope = InstrumentationScope::builder(scope_name)
            .with_version(VERSION)
            .build();
        Self {
            tracer: provider.tracer_with_scope(scope),
            scope_name,
            config: Arc::new(config),
            enabled: Arc::new(AtomicBool::new(false)),
            pricing: Arc::new(CostCalculator::new()),
        }
    }

    /// Replace the pricing table used for cost estimates
    #[must_use]
    pub fn with_pricing(mut self, pricing: CostCalculator) -> Self {
        self.pricing = Arc::new(pricing);
        self
    }

    /// Name of the instrumentation scope spans are recorded under
    pub fn scope_name(&self) -> &'static str {
        self.scope_name
    }

    /// Instrumentation settings
    pub fn config(&self) -> &InstrumentationConfig {
        &self.config
    }

    /// Turn span creation on or off for all wrappers sharing this handle
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether span creation is switched on
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Whether the next call in the current context should produce a span
    pub fn is_active(&self) -> bool {
        self.is_enabled() && !context::is_instrumentation_suppressed()
    }

    /// Whether prompts and completions are captured for the current call
    pub fn record_content(&self) -> bool {
        context::should_send_prompts(self.config.trace_content)
    }

    pub(crate) fn start_span(&self, name: &'static str) -> LlmSpan {
        LlmSpan::start(&self.tracer, name)
    }

    /// Apply prompt/completion attributes, shortening long text
    pub(crate) fn apply_content(&self, span: &LlmSpan, attributes: Attributes) {
        let Some(max) = self.config.preview_max_chars else {
            span.set_attributes(attributes);
            return;
        };
        span.set_attributes(attributes.into_iter().map(|kv| match kv.value {
            Value::String(text) => KeyValue::new(kv.key, truncate(text.as_str(), max)),
            _ => kv,
        }));
    }

    /// Record token counters and, when enabled and priced, the cost
    pub(crate) fn record_usage(&self, span: &LlmSpan, model: PriceLookup<'_>, usage: TokenUsage) {
        span.set_optional(semconv::LLM_USAGE_PROMPT_TOKENS, usage.prompt_tokens);
        span.set_optional(semconv::LLM_USAGE_COMPLETION_TOKENS, usage.completion_tokens);
        span.set_optional(semconv::LLM_USAGE_TOTAL_TOKENS, usage.total_tokens());

        if !self.config.enable_cost_calculation {
            return;
        }
        let cost = match model {
            PriceLookup::Family(name) => self.pricing.estimate(name, &usage),
            PriceLookup::Exact(name) => self.pricing.estimate_exact(name, &usage),
        };
        span.set_optional(semconv::LLM_USAGE_COST_USD, cost);
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(max_chars).collect();
    preview.push_str("...");
    preview
}
