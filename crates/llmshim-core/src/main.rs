//! llmshim CLI
//!
//! Replays recorded model invocations through the instrumentation and prints
//! the spans they produce.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use opentelemetry::trace::Status;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use opentelemetry_sdk::Resource;
use serde_json::{json, Map, Value};
use tracing::info;

use llmshim::bedrock::{vendors::Vendor, BedrockRuntime, InvokeModelRequest};
use llmshim::instrumentor::{BedrockInstrumentor, Instrumentor, SageMakerInstrumentor, WRAPPED_METHODS};
use llmshim::replay::ReplayClient;
use llmshim::sagemaker::{InvokeEndpointRequest, SageMakerRuntime};

/// llmshim - tracing shims for cloud LLM clients
#[derive(Parser)]
#[command(name = "llmshim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "LLMSHIM_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded Bedrock invocation and print its span
    Replay {
        /// Model identifier, e.g. anthropic.claude-v2
        #[arg(long)]
        model_id: String,

        /// File holding the JSON request body
        #[arg(long)]
        request: PathBuf,

        /// File holding the recorded response body (one event per line with --stream)
        #[arg(long)]
        response: PathBuf,

        /// Media type of the recorded response
        #[arg(long, default_value = "application/json")]
        accept: String,

        /// Treat the recording as a response stream
        #[arg(long)]
        stream: bool,
    },

    /// Replay a recorded SageMaker endpoint invocation and print its span
    ReplayEndpoint {
        /// Endpoint name
        #[arg(long)]
        endpoint: String,

        /// File holding the request payload
        #[arg(long)]
        request: PathBuf,

        /// File holding the recorded response payload
        #[arg(long)]
        response: PathBuf,

        /// Treat the recording as a response stream
        #[arg(long)]
        stream: bool,
    },

    /// List supported vendors and the request fields read for each
    Vendors,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match llmshim::Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    llmshim::logging::init_logging(&config.logging);

    let result = match cli.command {
        Commands::Replay {
            model_id,
            request,
            response,
            accept,
            stream,
        } => run_replay(&config, &model_id, &request, &response, &accept, stream, cli.format),
        Commands::ReplayEndpoint {
            endpoint,
            request,
            response,
            stream,
        } => run_replay_endpoint(&config, &endpoint, &request, &response, stream, cli.format),
        Commands::Vendors => {
            run_vendors();
            Ok(())
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

/// Tracer provider keeping every finished span in memory
fn in_memory_provider(config: &llmshim::Config) -> (SdkTracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .with_resource(
            Resource::builder()
                .with_service_name(config.instrumentation.service_name.clone())
                .build(),
        )
        .build();
    (provider, exporter)
}

/// Print the recorded spans, then shut the provider down
fn print_and_shutdown(
    provider: SdkTracerProvider,
    exporter: &InMemorySpanExporter,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let spans = exporter
        .get_finished_spans()
        .context("reading finished spans")?;
    print_spans(&spans, format)?;
    provider.shutdown().context("shutting down tracer provider")
}

#[allow(clippy::too_many_arguments)]
fn run_replay(
    config: &llmshim::Config,
    model_id: &str,
    request: &Path,
    response: &Path,
    accept: &str,
    stream: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    info!(model_id, stream, "Replaying Bedrock invocation");

    let (provider, exporter) = in_memory_provider(config);
    let instrumentor = BedrockInstrumentor::new(&provider, &config.instrumentation);
    instrumentor.instrument();

    let client = instrumentor.wrap(
        ReplayClient::new(read(response)?).with_content_type(Some(accept.to_string())),
    );
    let request = InvokeModelRequest::new(model_id, read(request)?).with_accept(accept);

    if stream {
        let parts = client.invoke_model_with_response_stream(request)?;
        for part in parts {
            part?;
        }
    } else {
        client.invoke_model(request)?;
    }

    print_and_shutdown(provider, &exporter, format)
}

fn run_replay_endpoint(
    config: &llmshim::Config,
    endpoint: &str,
    request: &Path,
    response: &Path,
    stream: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    info!(endpoint, stream, "Replaying SageMaker invocation");

    let (provider, exporter) = in_memory_provider(config);
    let instrumentor = SageMakerInstrumentor::new(&provider, &config.instrumentation);
    instrumentor.instrument();

    let client = instrumentor.wrap(ReplayClient::new(read(response)?));
    let request = InvokeEndpointRequest::new(endpoint, read(request)?);

    if stream {
        let parts = client.invoke_endpoint_with_response_stream(request)?;
        for part in parts {
            part?;
        }
    } else {
        client.invoke_endpoint(request)?;
    }

    print_and_shutdown(provider, &exporter, format)
}

fn duration_ms(span: &SpanData) -> f64 {
    span.end_time
        .duration_since(span.start_time)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or_default()
}

fn status_label(status: &Status) -> String {
    match status {
        Status::Unset => "unset".to_string(),
        Status::Ok => "ok".to_string(),
        Status::Error { description } => format!("error: {description}"),
    }
}

fn span_to_json(span: &SpanData) -> Value {
    let attributes: Map<String, Value> = span
        .attributes
        .iter()
        .map(|kv| {
            let value = match &kv.value {
                opentelemetry::Value::Bool(b) => json!(b),
                opentelemetry::Value::I64(i) => json!(i),
                opentelemetry::Value::F64(f) => json!(f),
                other => json!(other.to_string()),
            };
            (kv.key.as_str().to_string(), value)
        })
        .collect();
    let events: Vec<Value> = span
        .events
        .events
        .iter()
        .map(|event| json!({ "name": event.name.to_string() }))
        .collect();

    json!({
        "name": span.name.to_string(),
        "trace_id": span.span_context.trace_id().to_string(),
        "span_id": span.span_context.span_id().to_string(),
        "parent_span_id": span.parent_span_id.to_string(),
        "scope": span.instrumentation_scope.name(),
        "kind": format!("{:?}", span.span_kind),
        "status": status_label(&span.status),
        "duration_ms": duration_ms(span),
        "attributes": attributes,
        "events": events,
    })
}

fn print_spans(spans: &[SpanData], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let spans: Vec<Value> = spans.iter().map(span_to_json).collect();
            println!("{}", serde_json::to_string_pretty(&spans)?);
        }
        OutputFormat::Text => {
            for span in spans {
                println!(
                    "{} [{}] trace={} span={} {:.3}ms",
                    span.name,
                    status_label(&span.status),
                    span.span_context.trace_id(),
                    span.span_context.span_id(),
                    duration_ms(span)
                );
                for kv in &span.attributes {
                    println!("  {} = {}", kv.key, kv.value);
                }
            }
        }
    }
    Ok(())
}

fn run_vendors() {
    println!("{:<10} {:<38} {:<38} {:<40}", "VENDOR", "TOP_P", "TEMPERATURE", "MAX_TOKENS");
    for vendor in &Vendor::KNOWN {
        if let Some(fields) = vendor.request_fields() {
            println!(
                "{:<10} {:<38} {:<38} {:<40}",
                vendor.as_str(),
                fields.top_p.join(", "),
                fields.temperature.join(", "),
                fields.max_tokens.join(", ")
            );
        }
    }
    println!();
    println!("Intercepted operations:");
    for method in WRAPPED_METHODS {
        println!("  {}::{} ({})", method.object, method.method, method.service);
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "llmshim", &mut io::stdout());
}
