//! The per-request session context.

use super::{AttributeBag, Timings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one request across logs, filters, timings and cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// The unique id for this request.
    pub id: Uuid,
    /// When the context was created.
    pub received_at: DateTime<Utc>,
}

impl SessionIdentity {
    /// Creates a new identity with a generated id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
        }
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable, request-scoped state shared by every stage of a pipeline run.
///
/// Exactly one context exists per request. It is created by the
/// [`ContextBuilder`](super::ContextBuilder), shared through an `Arc` by the
/// request, every message derived from it, and the session cleaner.
#[derive(Debug, Default)]
pub struct SessionContext {
    identity: SessionIdentity,
    attributes: AttributeBag,
    timings: Timings,
}

impl SessionContext {
    /// Creates a fresh, empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with an explicit identity.
    #[must_use]
    pub fn with_identity(identity: SessionIdentity) -> Self {
        Self {
            identity,
            attributes: AttributeBag::new(),
            timings: Timings::new(),
        }
    }

    /// Returns the request id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.identity.id
    }

    /// Returns the full identity.
    #[must_use]
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Returns the attribute bag.
    #[must_use]
    pub fn attributes(&self) -> &AttributeBag {
        &self.attributes
    }

    /// Returns the timing registry.
    #[must_use]
    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Sets an attribute, returning self for chaining during decoration.
    #[must_use]
    pub fn with_attribute(self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.set(key, value);
        self
    }

    /// Returns true if nothing has been recorded against the context yet.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.attributes.is_empty() && self.timings.is_pristine()
    }

    /// Builds a JSON summary for logs and events.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.identity.id.to_string(),
            "received_at": self.identity.received_at.to_rfc3339(),
            "attributes": self.attributes.to_dict(),
            "timings": self.timings.snapshot(),
        })
    }
}
