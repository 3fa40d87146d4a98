//! Client spans recorded through the OpenTelemetry SDK.
//!
//! An [`LlmSpan`] owns the [`Context`] holding its span. Attaching that
//! context makes the span the parent of anything started meanwhile; a span
//! that is never attached (a streamed response) parents nothing.

use std::borrow::Cow;

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_sdk::trace::SdkTracer;
use tracing::debug;

/// Whether a value would be recorded; empty strings never are
pub fn is_empty(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.as_str().is_empty())
}

/// A client span that is still being recorded
#[derive(Debug)]
pub struct LlmSpan {
    cx: Context,
}

impl LlmSpan {
    /// Start a client span under the current context
    pub fn start(tracer: &SdkTracer, name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        debug!(span_name = %name, "Span started");
        let span = tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .start(tracer);
        Self {
            cx: Context::current_with_span(span),
        }
    }

    /// Context carrying the span, for attaching around the wrapped call
    pub fn context(&self) -> &Context {
        &self.cx
    }

    /// True until the span ends
    pub fn is_recording(&self) -> bool {
        self.cx.span().is_recording()
    }

    /// Set an attribute; empty strings are ignored
    pub fn set_attribute(&self, attribute: KeyValue) {
        if is_empty(&attribute.value) {
            return;
        }
        self.cx.span().set_attribute(attribute);
    }

    /// Set every attribute of a list
    pub fn set_attributes(&self, attributes: impl IntoIterator<Item = KeyValue>) {
        for attribute in attributes {
            self.set_attribute(attribute);
        }
    }

    /// Set an attribute when a value is present
    pub fn set_optional<V: Into<Value>>(&self, key: &'static str, value: Option<V>) {
        if let Some(value) = value {
            self.set_attribute(KeyValue::new(key, value));
        }
    }

    /// Mark the span failed and attach an exception event
    pub fn record_error(&self, message: &str) {
        let span = self.cx.span();
        span.add_event(
            "exception",
            vec![KeyValue::new("exception.message", message.to_string())],
        );
        span.set_status(Status::error(message.to_string()));
    }

    /// End the span and hand it to the provider's processors
    pub fn end(self) {
        self.cx.span().end();
    }
}
