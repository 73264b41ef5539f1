//! Error types for the edgeflow request pipeline.
//!
//! The taxonomy separates failures the pipeline recovers from (a failed
//! response write) from failures it surfaces to the caller (construction and
//! filter stage failures).

use crate::filters::FilterStage;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type returned by a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request or its context could not be constructed.
    #[error("{0}")]
    Construction(#[from] ConstructionError),

    /// A filter stage failed.
    #[error("{0}")]
    Stage(#[from] StageFailure),

    /// The processor configuration is invalid or incomplete.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns the stage failure, if this error is one.
    #[must_use]
    pub fn as_stage_failure(&self) -> Option<&StageFailure> {
        match self {
            Self::Stage(failure) => Some(failure),
            _ => None,
        }
    }

    /// Returns true if this is a stage failure.
    #[must_use]
    pub fn is_stage_failure(&self) -> bool {
        matches!(self, Self::Stage(_))
    }

    /// Returns true if this is a construction failure.
    #[must_use]
    pub fn is_construction_failure(&self) -> bool {
        matches!(self, Self::Construction(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        match self {
            Self::Construction(_) => {
                map.insert("type".to_string(), serde_json::json!("ConstructionError"));
            }
            Self::Stage(failure) => {
                map.insert("type".to_string(), serde_json::json!("StageFailure"));
                map.insert("stage".to_string(), serde_json::json!(failure.stage.as_str()));
                if let Some(ref filter) = failure.filter {
                    map.insert("filter".to_string(), serde_json::json!(filter));
                }
            }
            Self::Config(_) => {
                map.insert("type".to_string(), serde_json::json!("ConfigError"));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Error raised while building the request and its session context.
#[derive(Debug, Clone, Error)]
pub enum ConstructionError {
    /// The context factory rejected the native request.
    #[error("Malformed native request: {reason}")]
    MalformedRequest {
        /// Why the request was rejected.
        reason: String,
    },

    /// A decorator returned a context with a different identity.
    #[error("Session context decorator replaced context {expected} with {actual}")]
    IdentityReplaced {
        /// The id of the freshly built context.
        expected: uuid::Uuid,
        /// The id of the context the decorator returned.
        actual: uuid::Uuid,
    },
}

impl ConstructionError {
    /// Creates a malformed request error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRequest {
            reason: reason.into(),
        }
    }
}

/// Error raised by a filter stage.
///
/// Stage failures are terminal for the pipeline run: they are logged and
/// returned to the caller, never converted into a fallback response.
#[derive(Debug, Clone, Error)]
#[error("Filter stage '{stage}' failed{}: {message}", filter_suffix(.filter))]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: FilterStage,
    /// The filter that failed, when known.
    pub filter: Option<String>,
    /// The failure message.
    pub message: String,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage: FilterStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            filter: None,
            message: message.into(),
        }
    }

    /// Sets the failing filter name.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

fn filter_suffix(filter: &Option<String>) -> String {
    filter
        .as_ref()
        .map(|name| format!(" in filter '{name}'"))
        .unwrap_or_default()
}

/// Error raised while writing a response to the native channel.
///
/// Serialization and transport errors are not distinguished; every write
/// failure is recovered into a fallback response.
#[derive(Debug, Clone, Error)]
#[error("Response write failed: {message}")]
pub struct WriteFailure {
    /// The failure message.
    pub message: String,
}

impl WriteFailure {
    /// Creates a new write failure.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for WriteFailure {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}
