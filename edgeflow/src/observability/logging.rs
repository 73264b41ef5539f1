//! Tracing subscriber setup.

use crate::config::LoggingConfig;
use crate::errors::PipelineError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Builds a filter from a directive string such as `"info,edgeflow=debug"`.
///
/// # Errors
///
/// Returns a configuration error if the directive cannot be parsed.
pub fn directive_filter(directive: &str) -> Result<EnvFilter, PipelineError> {
    EnvFilter::try_new(directive)
        .map_err(|e| PipelineError::config(format!("invalid log directive '{directive}': {e}")))
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Errors
///
/// Returns a configuration error if the level is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), PipelineError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => directive_filter(&config.level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| PipelineError::config(format!("failed to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_filter() {
        assert!(directive_filter("info").is_ok());
        assert!(directive_filter("warn,edgeflow=debug").is_ok());
        assert!(directive_filter("edgeflow=notalevel").is_err());
    }

    #[test]
    fn test_init_tracing_installs_once() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            json: true,
        };
        init_tracing(&config).unwrap();
        assert!(init_tracing(&config).is_err());
    }
}
