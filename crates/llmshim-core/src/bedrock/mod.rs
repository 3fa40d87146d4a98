//! Bedrock runtime instrumentation
//!
//! [`InstrumentedBedrock`] wraps any [`BedrockRuntime`] client. Each call
//! produces one `bedrock.completion` client span carrying the vendor, the
//! model, sampling parameters, prompts, completions and token usage. Errors
//! from the wrapped client are recorded on the span and returned unchanged.

mod model_id;
pub mod vendors;

pub use model_id::ModelId;
pub use vendors::Vendor;

use bytes::Bytes;
use opentelemetry::KeyValue;
use serde_json::Value;
use tracing::debug;

use crate::body::{decode_bedrock_event, decode_body, PayloadPart, StreamingBody};
use crate::instrumentation::{Instrumentation, PriceLookup};
use crate::semconv;
use crate::stream::InstrumentedStream;
use crate::tracer::LlmSpan;

/// Name of the span recorded for every Bedrock invocation
pub const SPAN_NAME: &str = "bedrock.completion";

/// Service name Bedrock runtime clients are created under
pub const SERVICE_NAME: &str = "bedrock-runtime";

/// An `InvokeModel` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeModelRequest {
    /// Model identifier, e.g. `anthropic.claude-v2`
    pub model_id: String,
    /// JSON request body
    pub body: Bytes,
    /// Media type of the request body
    pub content_type: Option<String>,
    /// Requested media type of the response body
    pub accept: Option<String>,
}

impl InvokeModelRequest {
    /// JSON request for a model
    pub fn new(model_id: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            model_id: model_id.into(),
            body: body.into(),
            content_type: Some("application/json".to_string()),
            accept: Some("application/json".to_string()),
        }
    }

    /// Override the accepted response media type
    #[must_use]
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

/// An `InvokeModel` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeModelResponse {
    /// Response body
    pub body: StreamingBody,
    /// Media type of the response body
    pub content_type: Option<String>,
}

/// The Bedrock runtime operations that get instrumented
pub trait BedrockRuntime {
    /// Error returned by the client
    type Error: std::fmt::Display;
    /// Streamed response events
    type Stream: Iterator<Item = Result<PayloadPart, Self::Error>>;

    /// Invoke a model and return the whole response
    fn invoke_model(&self, request: InvokeModelRequest) -> Result<InvokeModelResponse, Self::Error>;

    /// Invoke a model and stream the response
    fn invoke_model_with_response_stream(
        &self,
        request: InvokeModelRequest,
    ) -> Result<Self::Stream, Self::Error>;
}

/// A Bedrock client that records a span per invocation
pub struct InstrumentedBedrock<C> {
    inner: C,
    instrumentation: Instrumentation,
}

impl<C> InstrumentedBedrock<C> {
    /// Wrap a client
    pub fn new(inner: C, instrumentation: Instrumentation) -> Self {
        Self {
            inner,
            instrumentation,
        }
    }

    /// The wrapped client
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwrap the client
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: BedrockRuntime> BedrockRuntime for InstrumentedBedrock<C> {
    type Error = C::Error;
    type Stream = InstrumentedStream<C::Stream>;

    fn invoke_model(&self, request: InvokeModelRequest) -> Result<InvokeModelResponse, Self::Error> {
        if !self.instrumentation.is_active() {
            return self.inner.invoke_model(request);
        }

        let span = self.instrumentation.start_span(SPAN_NAME);
        let call = Call::new(&self.instrumentation, &request);
        call.annotate_request(&self.instrumentation, &span);

        let result = {
            let _guard = span.context().clone().attach();
            self.inner.invoke_model(request)
        };
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                span.record_error(&e.to_string());
                return Err(e);
            }
        };

        let content_type = response.content_type.as_deref().or(call.accept.as_deref());
        if let Some(body) = decode_body(&response.body.read_all(), content_type) {
            call.annotate_response(&self.instrumentation, &span, &body);
        }
        span.end();

        Ok(response)
    }

    fn invoke_model_with_response_stream(
        &self,
        request: InvokeModelRequest,
    ) -> Result<Self::Stream, Self::Error> {
        if !self.instrumentation.is_active() {
            return self
                .inner
                .invoke_model_with_response_stream(request)
                .map(InstrumentedStream::passthrough);
        }

        let span = self.instrumentation.start_span(SPAN_NAME);
        let call = Call::new(&self.instrumentation, &request);
        call.annotate_request(&self.instrumentation, &span);
        span.set_attribute(KeyValue::new(semconv::LLM_IS_STREAMING, true));

        let result = {
            let _guard = span.context().clone().attach();
            self.inner.invoke_model_with_response_stream(request)
        };
        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                span.record_error(&e.to_string());
                return Err(e);
            }
        };

        let instrumentation = self.instrumentation.clone();
        Ok(InstrumentedStream::recording(
            stream,
            span,
            Box::new(move |span, parts| {
                let Some(model_id) = &call.model_id else {
                    return;
                };
                let events: Vec<Value> = parts
                    .iter()
                    .filter_map(|part| decode_bedrock_event(part))
                    .collect();
                debug!(events = events.len(), "Merging Bedrock stream events");
                let body = vendors::merge_stream_chunks(&model_id.vendor, &events);
                call.annotate_response(&instrumentation, span, &body);
            }),
        ))
    }
}

/// What is known about an invocation before the response arrives
struct Call {
    model_id: Option<ModelId>,
    request_body: Option<Value>,
    accept: Option<String>,
    record_content: bool,
}

impl Call {
    fn new(instrumentation: &Instrumentation, request: &InvokeModelRequest) -> Self {
        let model_id = ModelId::parse(&request.model_id);
        if model_id.is_none() {
            debug!(model_id = %request.model_id, "Model id has no vendor segment");
        }

        let request_body = serde_json::from_slice(&request.body)
            .map_err(|e| debug!(error = %e, "Request body is not JSON"))
            .ok();

        Self {
            model_id,
            request_body,
            accept: request.accept.clone(),
            record_content: instrumentation.record_content(),
        }
    }

    fn annotate_request(&self, instrumentation: &Instrumentation, span: &LlmSpan) {
        if !span.is_recording() {
            return;
        }
        let Some(model_id) = &self.model_id else {
            return;
        };

        span.set_attribute(KeyValue::new(semconv::LLM_VENDOR, model_id.vendor.to_string()));
        span.set_attribute(KeyValue::new(semconv::LLM_REQUEST_MODEL, model_id.model.clone()));

        let Some(body) = &self.request_body else {
            return;
        };
        span.set_attributes(vendors::request_attributes(&model_id.vendor, &model_id.model, body));
        if self.record_content {
            instrumentation.apply_content(span, vendors::prompt_attributes(&model_id.vendor, body));
        }
    }

    fn annotate_response(&self, instrumentation: &Instrumentation, span: &LlmSpan, body: &Value) {
        if !span.is_recording() {
            return;
        }
        let Some(model_id) = &self.model_id else {
            return;
        };

        span.set_optional(semconv::LLM_RESPONSE_MODEL, vendors::response_model(body));
        if self.record_content {
            instrumentation.apply_content(span, vendors::completion_attributes(&model_id.vendor, body));
        }
        instrumentation.record_usage(
            span,
            PriceLookup::Family(&model_id.model),
            vendors::usage(&model_id.vendor, body),
        );
    }
}
