//! Configuration management for llmshim
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! `LLMSHIM_*` environment variables (for example
//! `LLMSHIM_INSTRUMENTATION__TRACE_CONTENT=false`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "LLMSHIM";

/// Legacy switch for prompt/completion capture, honoured on every call
pub const TRACE_CONTENT_ENV: &str = "TRACELOOP_TRACE_CONTENT";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Instrumentation configuration
    pub instrumentation: InstrumentationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(dotenv) = dotenvy::dotenv() {
            debug!(path = %dotenv.display(), "Loaded .env file");
        }

        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot be honoured
    pub fn validate(&self) -> Result<()> {
        if self.instrumentation.service_name.trim().is_empty() {
            return Err(crate::Error::config("instrumentation.service_name must not be empty"));
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(crate::Error::config(format!(
                "logging.format must be json or pretty, got {other}"
            ))),
        }
    }
}

/// Instrumentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Record prompts and completions on spans
    pub trace_content: bool,
    /// Service name put on the tracer provider's resource by the CLI
    pub service_name: String,
    /// Record an estimated cost when usage counters are known
    pub enable_cost_calculation: bool,
    /// Maximum characters kept for a single prompt or completion attribute
    pub preview_max_chars: Option<usize>,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            trace_content: true,
            service_name: "llmshim".to_string(),
            enable_cost_calculation: true,
            preview_max_chars: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Interpret a `TRACELOOP_TRACE_CONTENT` value.
///
/// Unset means no opinion; any value other than `true` (case-insensitive)
/// disables content capture.
pub fn parse_trace_content(value: Option<&str>) -> Option<bool> {
    value.map(|v| v.trim().eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.instrumentation.trace_content);
        assert!(config.instrumentation.enable_cost_calculation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_trace_content() {
        assert_eq!(parse_trace_content(None), None);
        assert_eq!(parse_trace_content(Some("true")), Some(true));
        assert_eq!(parse_trace_content(Some("TRUE")), Some(true));
        assert_eq!(parse_trace_content(Some("false")), Some(false));
        assert_eq!(parse_trace_content(Some("0")), Some(false));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[instrumentation]\ntrace_content = false\nservice_name = \"billing\"\n\n[logging]\nformat = \"json\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert!(!config.instrumentation.trace_content);
        assert_eq!(config.instrumentation.service_name, "billing");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
