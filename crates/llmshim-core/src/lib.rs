//! # llmshim
//!
//! Tracing shims for cloud LLM inference clients.
//!
//! llmshim wraps Bedrock runtime and SageMaker runtime clients so that every
//! invocation produces one client span annotated with LLM semantic-convention
//! attributes: vendor, model, request type, sampling parameters, prompts,
//! completions, token usage and estimated cost.
//!
//! ## Architecture
//!
//! - **Instrumentors**: switch instrumentation on and off and hand out wrapped clients
//! - **Vendor tables**: map each vendor's request and response fields to attributes
//! - **Streams**: re-assemble streamed responses before annotating the span
//! - **Spans**: recorded through the OpenTelemetry SDK tracer provider you pass in
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use llmshim::prelude::*;
//! use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
//!
//! let exporter = InMemorySpanExporter::default();
//! let provider = SdkTracerProvider::builder()
//!     .with_simple_exporter(exporter.clone())
//!     .build();
//! let instrumentor = BedrockInstrumentor::new(&provider, &Default::default());
//! instrumentor.instrument();
//!
//! let client = instrumentor.wrap(my_bedrock_client);
//! client.invoke_model(InvokeModelRequest::new("cohere.command-text-v14", body))?;
//! assert_eq!(exporter.get_finished_spans()?.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bedrock;
pub mod body;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod instrumentation;
pub mod instrumentor;
pub mod logging;
pub mod models;
pub mod replay;
pub mod sagemaker;
pub mod semconv;
pub mod stream;
pub mod tracer;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::bedrock::{BedrockRuntime, InstrumentedBedrock, InvokeModelRequest, InvokeModelResponse};
    pub use crate::body::{PayloadPart, StreamingBody};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::instrumentor::{
        BedrockInstrumentor, ClientCreator, CloudInstrumentor, Instrumentor, SageMakerInstrumentor,
        ServiceClient,
    };
    pub use crate::models::*;
    pub use crate::sagemaker::{
        InstrumentedSageMaker, InvokeEndpointRequest, InvokeEndpointResponse, SageMakerRuntime,
    };
    pub use crate::tracer::LlmSpan;
}
