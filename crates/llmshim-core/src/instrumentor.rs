//! Instrumentors: hand out instrumented clients and switch them on and off.
//!
//! Clients are wrapped either directly (`BedrockInstrumentor::wrap`) or by
//! intercepting a client factory with [`InstrumentedClientCreator`], which
//! wraps runtime clients as they are created and leaves every other service
//! untouched.

use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::{debug, info};

use crate::bedrock::{self, BedrockRuntime, InstrumentedBedrock};
use crate::config::InstrumentationConfig;
use crate::error::Result;
use crate::instrumentation::Instrumentation;
use crate::sagemaker::{self, InstrumentedSageMaker, SageMakerRuntime};

/// Version recorded as the instrumentation scope version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A client operation that gets a span
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrappedMethod {
    /// Service the client is created for
    pub service: &'static str,
    /// Client type
    pub object: &'static str,
    /// Intercepted operation
    pub method: &'static str,
}

/// Every intercepted operation
pub const WRAPPED_METHODS: &[WrappedMethod] = &[
    WrappedMethod {
        service: bedrock::SERVICE_NAME,
        object: "BedrockRuntime",
        method: "invoke_model",
    },
    WrappedMethod {
        service: bedrock::SERVICE_NAME,
        object: "BedrockRuntime",
        method: "invoke_model_with_response_stream",
    },
    WrappedMethod {
        service: sagemaker::SERVICE_NAME,
        object: "SageMakerRuntime",
        method: "invoke_endpoint",
    },
    WrappedMethod {
        service: sagemaker::SERVICE_NAME,
        object: "SageMakerRuntime",
        method: "invoke_endpoint_with_response_stream",
    },
];

/// Lifecycle shared by all instrumentors
pub trait Instrumentor {
    /// Client libraries this instrumentor targets
    fn instrumentation_dependencies(&self) -> &'static [&'static str];

    /// Start recording spans on every client handed out
    fn instrument(&self);

    /// Stop recording; wrapped clients pass straight through
    fn uninstrument(&self);

    /// Whether spans are currently recorded
    fn is_instrumented(&self) -> bool;
}

macro_rules! impl_instrumentor {
    ($ty:ty, $deps:expr) => {
        impl Instrumentor for $ty {
            fn instrumentation_dependencies(&self) -> &'static [&'static str] {
                $deps
            }

            fn instrument(&self) {
                info!(scope = self.instrumentation.scope_name(), "Instrumenting");
                self.instrumentation.set_enabled(true);
            }

            fn uninstrument(&self) {
                info!(scope = self.instrumentation.scope_name(), "Uninstrumenting");
                self.instrumentation.set_enabled(false);
            }

            fn is_instrumented(&self) -> bool {
                self.instrumentation.is_enabled()
            }
        }
    };
}

/// Instrumentor for Bedrock runtime clients
#[derive(Debug, Clone)]
pub struct BedrockInstrumentor {
    instrumentation: Instrumentation,
}

impl BedrockInstrumentor {
    /// Create an instrumentor recording into `provider`; call `instrument()` to start
    pub fn new(provider: &SdkTracerProvider, config: &InstrumentationConfig) -> Self {
        Self {
            instrumentation: Instrumentation::new(provider, "llmshim.bedrock", config.clone()),
        }
    }

    /// Create an instrumentor around an existing handle
    pub fn from_instrumentation(instrumentation: Instrumentation) -> Self {
        Self { instrumentation }
    }

    /// Shared instrumentation handle
    pub fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }

    /// Wrap a client
    pub fn wrap<C: BedrockRuntime>(&self, client: C) -> InstrumentedBedrock<C> {
        InstrumentedBedrock::new(client, self.instrumentation.clone())
    }
}

impl_instrumentor!(BedrockInstrumentor, &["bedrock-runtime"]);

/// Instrumentor for SageMaker runtime clients
#[derive(Debug, Clone)]
pub struct SageMakerInstrumentor {
    instrumentation: Instrumentation,
}

impl SageMakerInstrumentor {
    /// Create an instrumentor recording into `provider`; call `instrument()` to start
    pub fn new(provider: &SdkTracerProvider, config: &InstrumentationConfig) -> Self {
        Self {
            instrumentation: Instrumentation::new(provider, "llmshim.sagemaker", config.clone()),
        }
    }

    /// Create an instrumentor around an existing handle
    pub fn from_instrumentation(instrumentation: Instrumentation) -> Self {
        Self { instrumentation }
    }

    /// Shared instrumentation handle
    pub fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }

    /// Wrap a client
    pub fn wrap<C: SageMakerRuntime>(&self, client: C) -> InstrumentedSageMaker<C> {
        InstrumentedSageMaker::new(client, self.instrumentation.clone())
    }
}

impl_instrumentor!(SageMakerInstrumentor, &["sagemaker-runtime"]);

/// A client built by a [`ClientCreator`]
#[derive(Debug)]
pub enum ServiceClient<B, S, O> {
    /// Bedrock runtime client
    BedrockRuntime(B),
    /// SageMaker runtime client
    SageMakerRuntime(S),
    /// Any other service
    Other(O),
}

impl<B, S, O> ServiceClient<B, S, O> {
    /// The Bedrock client, if that is what was created
    pub fn into_bedrock(self) -> Option<B> {
        match self {
            Self::BedrockRuntime(client) => Some(client),
            _ => None,
        }
    }

    /// The SageMaker client, if that is what was created
    pub fn into_sagemaker(self) -> Option<S> {
        match self {
            Self::SageMakerRuntime(client) => Some(client),
            _ => None,
        }
    }
}

/// A factory creating SDK clients by service name
pub trait ClientCreator {
    /// Bedrock runtime client type
    type Bedrock: BedrockRuntime;
    /// SageMaker runtime client type
    type SageMaker: SageMakerRuntime;
    /// Client type for any other service
    type Other;

    /// Create a client for `service_name`
    fn create_client(
        &self,
        service_name: &str,
    ) -> Result<ServiceClient<Self::Bedrock, Self::SageMaker, Self::Other>>;
}

/// Instruments Bedrock and SageMaker together and intercepts client creation
#[derive(Debug, Clone)]
pub struct CloudInstrumentor {
    bedrock: BedrockInstrumentor,
    sagemaker: SageMakerInstrumentor,
}

impl CloudInstrumentor {
    /// Create both instrumentors over one tracer provider
    pub fn new(provider: &SdkTracerProvider, config: &InstrumentationConfig) -> Self {
        Self {
            bedrock: BedrockInstrumentor::new(provider, config),
            sagemaker: SageMakerInstrumentor::new(provider, config),
        }
    }

    /// Bedrock half
    pub fn bedrock(&self) -> &BedrockInstrumentor {
        &self.bedrock
    }

    /// SageMaker half
    pub fn sagemaker(&self) -> &SageMakerInstrumentor {
        &self.sagemaker
    }

    /// Intercept a client factory
    pub fn wrap_creator<C: ClientCreator>(&self, creator: C) -> InstrumentedClientCreator<C> {
        InstrumentedClientCreator {
            inner: creator,
            bedrock: self.bedrock.clone(),
            sagemaker: self.sagemaker.clone(),
        }
    }
}

impl Instrumentor for CloudInstrumentor {
    fn instrumentation_dependencies(&self) -> &'static [&'static str] {
        &["bedrock-runtime", "sagemaker-runtime"]
    }

    fn instrument(&self) {
        self.bedrock.instrument();
        self.sagemaker.instrument();
    }

    fn uninstrument(&self) {
        self.bedrock.uninstrument();
        self.sagemaker.uninstrument();
    }

    fn is_instrumented(&self) -> bool {
        self.bedrock.is_instrumented() && self.sagemaker.is_instrumented()
    }
}

/// A client factory whose runtime clients come back instrumented
pub struct InstrumentedClientCreator<C> {
    inner: C,
    bedrock: BedrockInstrumentor,
    sagemaker: SageMakerInstrumentor,
}

impl<C: ClientCreator> ClientCreator for InstrumentedClientCreator<C> {
    type Bedrock = InstrumentedBedrock<C::Bedrock>;
    type SageMaker = InstrumentedSageMaker<C::SageMaker>;
    type Other = C::Other;

    fn create_client(
        &self,
        service_name: &str,
    ) -> Result<ServiceClient<Self::Bedrock, Self::SageMaker, Self::Other>> {
        let client = self.inner.create_client(service_name)?;
        Ok(match client {
            ServiceClient::BedrockRuntime(client) => {
                debug!(service = service_name, "Wrapping Bedrock runtime client");
                ServiceClient::BedrockRuntime(self.bedrock.wrap(client))
            }
            ServiceClient::SageMakerRuntime(client) => {
                debug!(service = service_name, "Wrapping SageMaker runtime client");
                ServiceClient::SageMakerRuntime(self.sagemaker.wrap(client))
            }
            ServiceClient::Other(client) => ServiceClient::Other(client),
        })
    }
}
