//! Instrumented response streams.
//!
//! A streamed invocation returns before any output exists, so its span stays
//! open while the caller drains the stream. Every part is forwarded
//! unchanged and a copy is kept; the span is annotated from the collected
//! parts and exported when the stream ends, yields an error, or is dropped.
//! The span is never attached, so calls made while the stream is open are
//! not parented to it.

use std::fmt::Display;

use bytes::Bytes;

use crate::body::PayloadPart;
use crate::tracer::LlmSpan;

/// Annotates the span from the collected parts at end of stream
pub(crate) type Finalizer = Box<dyn FnOnce(&LlmSpan, &[Bytes]) + Send>;

struct Capture {
    span: LlmSpan,
    parts: Vec<Bytes>,
    finalize: Finalizer,
}

/// A response stream whose span ends with the stream
pub struct InstrumentedStream<S> {
    inner: S,
    capture: Option<Capture>,
}

impl<S> InstrumentedStream<S> {
    /// Forward the stream without recording
    pub(crate) fn passthrough(inner: S) -> Self {
        Self {
            inner,
            capture: None,
        }
    }

    /// Record the stream into `span`
    pub(crate) fn recording(inner: S, span: LlmSpan, finalize: Finalizer) -> Self {
        Self {
            inner,
            capture: Some(Capture {
                span,
                parts: Vec::new(),
                finalize,
            }),
        }
    }

    /// Whether a span is still open for this stream
    pub fn is_recording(&self) -> bool {
        self.capture.is_some()
    }

    fn finish(&mut self) {
        if let Some(Capture {
            span,
            parts,
            finalize,
        }) = self.capture.take()
        {
            finalize(&span, &parts);
            span.end();
        }
    }
}

impl<S, E> Iterator for InstrumentedStream<S>
where
    S: Iterator<Item = Result<PayloadPart, E>>,
    E: Display,
{
    type Item = Result<PayloadPart, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next();
        match &item {
            Some(Ok(part)) => {
                if let Some(capture) = self.capture.as_mut() {
                    capture.parts.push(part.bytes.clone());
                }
            }
            Some(Err(e)) => {
                if let Some(capture) = self.capture.as_mut() {
                    capture.span.record_error(&e.to_string());
                }
                self.finish();
            }
            None => self.finish(),
        }
        item
    }
}

impl<S> Drop for InstrumentedStream<S> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LlmSpanExt;
    use opentelemetry::trace::{Status, TracerProvider as _};
    use opentelemetry::{KeyValue, Value};
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracer, SdkTracerProvider};

    fn tracer() -> (SdkTracer, InMemorySpanExporter, SdkTracerProvider) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (provider.tracer("test"), exporter, provider)
    }

    fn count_parts() -> Finalizer {
        Box::new(|span, parts| {
            let count = i64::try_from(parts.len()).unwrap_or_default();
            span.set_attribute(KeyValue::new("parts", count));
        })
    }

    #[test]
    fn test_span_ends_with_stream() {
        let (tracer, exporter, _provider) = tracer();
        let parts: Vec<Result<PayloadPart, String>> =
            vec![Ok(PayloadPart::new("a")), Ok(PayloadPart::new("b"))];
        let span = LlmSpan::start(&tracer, "stream");
        let mut stream = InstrumentedStream::recording(parts.into_iter(), span, count_parts());

        assert!(stream.next().is_some());
        assert!(exporter.get_finished_spans().unwrap().is_empty());
        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(!stream.is_recording());

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].attribute("parts"), Some(&Value::I64(2)));
    }

    #[test]
    fn test_error_item_ends_span() {
        let (tracer, exporter, _provider) = tracer();
        let parts: Vec<Result<PayloadPart, String>> =
            vec![Ok(PayloadPart::new("a")), Err("connection reset".to_string())];
        let span = LlmSpan::start(&tracer, "stream");
        let collected: Vec<_> =
            InstrumentedStream::recording(parts.into_iter(), span, count_parts()).collect();

        assert_eq!(collected.len(), 2);
        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, Status::error("connection reset"));
        assert_eq!(spans[0].attribute("parts"), Some(&Value::I64(1)));
    }

    #[test]
    fn test_drop_ends_span_with_partial_parts() {
        let (tracer, exporter, _provider) = tracer();
        let parts: Vec<Result<PayloadPart, String>> =
            vec![Ok(PayloadPart::new("a")), Ok(PayloadPart::new("b"))];
        let span = LlmSpan::start(&tracer, "stream");
        let mut stream = InstrumentedStream::recording(parts.into_iter(), span, count_parts());
        stream.next();
        drop(stream);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].attribute("parts"), Some(&Value::I64(1)));
    }

    #[test]
    fn test_passthrough_records_nothing() {
        let (_, exporter, _provider) = tracer();
        let parts: Vec<Result<PayloadPart, String>> = vec![Ok(PayloadPart::new("a"))];
        let collected: Vec<_> = InstrumentedStream::passthrough(parts.into_iter()).collect();
        assert_eq!(collected.len(), 1);
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }
}
