//! SageMaker runtime instrumentation
//!
//! [`InstrumentedSageMaker`] records one `sagemaker.completion` span per
//! endpoint invocation. The endpoint name stands in for the model; it is
//! priced only when registered with `CostCalculator::set_pricing`.

pub mod payload;

use bytes::{Bytes, BytesMut};
use opentelemetry::KeyValue;
use serde_json::Value;
use tracing::debug;

use crate::body::{decode_body, PayloadPart, StreamingBody};
use crate::instrumentation::{Instrumentation, PriceLookup};
use crate::semconv;
use crate::stream::InstrumentedStream;
use crate::tracer::LlmSpan;

/// Name of the span recorded for every endpoint invocation
pub const SPAN_NAME: &str = "sagemaker.completion";

/// Service name SageMaker runtime clients are created under
pub const SERVICE_NAME: &str = "sagemaker-runtime";

/// Value of `llm.vendor` on SageMaker spans
pub const VENDOR: &str = "sagemaker";

/// An `InvokeEndpoint` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeEndpointRequest {
    /// Endpoint to invoke
    pub endpoint_name: String,
    /// Request payload
    pub body: Bytes,
    /// Media type of the payload
    pub content_type: Option<String>,
    /// Requested media type of the response
    pub accept: Option<String>,
    /// Inference component on a multi-model endpoint
    pub inference_component_name: Option<String>,
}

impl InvokeEndpointRequest {
    /// JSON request for an endpoint
    pub fn new(endpoint_name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            body: body.into(),
            content_type: Some("application/json".to_string()),
            accept: Some("application/json".to_string()),
            inference_component_name: None,
        }
    }
}

/// An `InvokeEndpoint` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeEndpointResponse {
    /// Response payload
    pub body: StreamingBody,
    /// Media type of the payload
    pub content_type: Option<String>,
    /// Production variant that served the request
    pub invoked_production_variant: Option<String>,
}

/// The SageMaker runtime operations that get instrumented
pub trait SageMakerRuntime {
    /// Error returned by the client
    type Error: std::fmt::Display;
    /// Streamed response parts
    type Stream: Iterator<Item = Result<PayloadPart, Self::Error>>;

    /// Invoke an endpoint and return the whole response
    fn invoke_endpoint(
        &self,
        request: InvokeEndpointRequest,
    ) -> Result<InvokeEndpointResponse, Self::Error>;

    /// Invoke an endpoint and stream the response
    fn invoke_endpoint_with_response_stream(
        &self,
        request: InvokeEndpointRequest,
    ) -> Result<Self::Stream, Self::Error>;
}

/// A SageMaker client that records a span per invocation
pub struct InstrumentedSageMaker<C> {
    inner: C,
    instrumentation: Instrumentation,
}

impl<C> InstrumentedSageMaker<C> {
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

impl<C: SageMakerRuntime> SageMakerRuntime for InstrumentedSageMaker<C> {
    type Error = C::Error;
    type Stream = InstrumentedStream<C::Stream>;

    fn invoke_endpoint(
        &self,
        request: InvokeEndpointRequest,
    ) -> Result<InvokeEndpointResponse, Self::Error> {
        if !self.instrumentation.is_active() {
            return self.inner.invoke_endpoint(request);
        }

        let span = self.instrumentation.start_span(SPAN_NAME);
        let call = Call::new(&self.instrumentation, &request);
        call.annotate_request(&self.instrumentation, &span, &request.body);

        let result = {
            let _guard = span.context().clone().attach();
            self.inner.invoke_endpoint(request)
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

    fn invoke_endpoint_with_response_stream(
        &self,
        request: InvokeEndpointRequest,
    ) -> Result<Self::Stream, Self::Error> {
        if !self.instrumentation.is_active() {
            return self
                .inner
                .invoke_endpoint_with_response_stream(request)
                .map(InstrumentedStream::passthrough);
        }

        let span = self.instrumentation.start_span(SPAN_NAME);
        let call = Call::new(&self.instrumentation, &request);
        call.annotate_request(&self.instrumentation, &span, &request.body);
        span.set_attribute(KeyValue::new(semconv::LLM_IS_STREAMING, true));

        let result = {
            let _guard = span.context().clone().attach();
            self.inner.invoke_endpoint_with_response_stream(request)
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
                let mut buffer = BytesMut::new();
                for part in parts {
                    buffer.extend_from_slice(part);
                }
                match payload::merge_stream(&buffer) {
                    Some(body) => call.annotate_response(&instrumentation, span, &body),
                    None => debug!(bytes = buffer.len(), "Endpoint stream carried no JSON"),
                }
            }),
        ))
    }
}

struct Call {
    endpoint_name: String,
    request_body: Option<Value>,
    accept: Option<String>,
    record_content: bool,
}

impl Call {
    fn new(instrumentation: &Instrumentation, request: &InvokeEndpointRequest) -> Self {
        let request_body = serde_json::from_slice(&request.body)
            .map_err(|e| debug!(error = %e, "Endpoint payload is not JSON"))
            .ok();
        let endpoint_name = match &request.inference_component_name {
            Some(component) => format!("{}/{component}", request.endpoint_name),
            None => request.endpoint_name.clone(),
        };

        Self {
            endpoint_name,
            request_body,
            accept: request.accept.clone(),
            record_content: instrumentation.record_content(),
        }
    }

    fn annotate_request(&self, instrumentation: &Instrumentation, span: &LlmSpan, raw: &[u8]) {
        if !span.is_recording() {
            return;
        }
        span.set_attribute(KeyValue::new(semconv::LLM_VENDOR, VENDOR));
        span.set_attribute(KeyValue::new(semconv::LLM_REQUEST_MODEL, self.endpoint_name.clone()));

        if let Some(body) = &self.request_body {
            span.set_attributes(payload::request_attributes(body));
        }
        if self.record_content {
            instrumentation.apply_content(
                span,
                payload::prompt_attributes(self.request_body.as_ref(), raw),
            );
        }
    }

    fn annotate_response(&self, instrumentation: &Instrumentation, span: &LlmSpan, body: &Value) {
        if !span.is_recording() {
            return;
        }
        if self.record_content {
            instrumentation.apply_content(span, payload::completion_attributes(body));
        }
        instrumentation.record_usage(
            span,
            PriceLookup::Exact(&self.endpoint_name),
            payload::usage(body),
        );
    }
}
