//! Configuration for the request processor.

use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for an [`HttpProcessor`](crate::processor::HttpProcessor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Processor name, attached to every log span.
    #[serde(default = "default_name")]
    pub name: String,
    /// Whether lifecycle events are sent to the event sink.
    #[serde(default = "default_emit_events")]
    pub emit_events: bool,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_name() -> String {
    "edgeflow".to_string()
}

fn default_emit_events() -> bool {
    true
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            emit_events: default_emit_events(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProcessorConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the processor name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables or disables event emission.
    #[must_use]
    pub fn with_emit_events(mut self, emit: bool) -> Self {
        self.emit_events = emit;
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the JSON is invalid or fails
    /// validation.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PipelineError::config(format!("invalid processor config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty name or log level.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::config("processor name must not be empty"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(PipelineError::config("logging level must not be empty"));
        }
        Ok(())
    }
}

/// Logging configuration used by [`init_tracing`](crate::observability::init_tracing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ProcessorConfig::new();
        assert_eq!(config.name, "edgeflow");
        assert!(config.emit_events);
        assert_eq!(config.logging, LoggingConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = ProcessorConfig::from_json_str(r#"{"name": "edge-eu"}"#).unwrap();
        assert_eq!(config.name, "edge-eu");
        assert!(config.emit_events);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_json_full() {
        let config = ProcessorConfig::from_json_str(
            r#"{
                "name": "edge",
                "emit_events": false,
                "logging": {"level": "debug", "json": true}
            }"#,
        )
        .unwrap();
        assert_eq!(
            config,
            ProcessorConfig::new()
                .with_name("edge")
                .with_emit_events(false)
                .with_logging(LoggingConfig {
                    level: "debug".to_string(),
                    json: true,
                })
        );
    }

    #[test]
    fn test_invalid_json() {
        let err = ProcessorConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = ProcessorConfig::from_json_str(r#"{"name": "  "}"#).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"name": "from-file", "logging": {{"json": true}}}}"#).unwrap();

        let config = ProcessorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.name, "from-file");
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_file() {
        let err = ProcessorConfig::from_file("/nonexistent/edgeflow.json").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
