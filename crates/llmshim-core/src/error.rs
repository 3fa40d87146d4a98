//! Error types for llmshim

use thiserror::Error;

/// Result type alias using llmshim's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for llmshim operations
#[derive(Error, Debug)]
pub enum Error {
    /// Error returned by a wrapped cloud client
    #[error("Client error: {0}")]
    Client(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown service requested from a client factory
    #[error("Unknown service: {0}")]
    UnknownService(String),
}

impl Error {
    /// Create a client error
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err = Error::from(config::ConfigError::Message("bad value".to_string()));
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: bad value");
    }
}
