//! Builds the request and its session context for a pipeline run.

use super::SessionContext;
use crate::errors::ConstructionError;
use crate::message::HttpRequestMessage;
use crate::processor::ContextFactory;
use std::sync::Arc;
use tracing::debug;

/// Optional hook that enriches a freshly built session context.
///
/// A decorator may add attributes but must return the same context it was
/// given; a context with a different id is rejected.
pub trait SessionContextDecorator: Send + Sync {
    /// Decorates the context.
    fn decorate(&self, context: SessionContext) -> SessionContext;
}

impl<F> SessionContextDecorator for F
where
    F: Fn(SessionContext) -> SessionContext + Send + Sync,
{
    fn decorate(&self, context: SessionContext) -> SessionContext {
        self(context)
    }
}

/// Turns a native request into a [`HttpRequestMessage`] with a fresh context.
pub struct ContextBuilder<F: ContextFactory> {
    factory: Arc<F>,
    decorator: Option<Arc<dyn SessionContextDecorator>>,
}

impl<F: ContextFactory> ContextBuilder<F> {
    /// Creates a builder without a decorator.
    #[must_use]
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            factory,
            decorator: None,
        }
    }

    /// Sets the decorator.
    #[must_use]
    pub fn with_decorator(mut self, decorator: Arc<dyn SessionContextDecorator>) -> Self {
        self.decorator = Some(decorator);
        self
    }

    /// Returns true if a decorator is configured.
    #[must_use]
    pub fn has_decorator(&self) -> bool {
        self.decorator.is_some()
    }

    /// Returns the context factory.
    #[must_use]
    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    /// Builds a fresh, optionally decorated, session context.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::IdentityReplaced`] if the decorator
    /// returns a different context.
    pub fn build_context(&self) -> Result<SessionContext, ConstructionError> {
        let context = SessionContext::new();

        let Some(decorator) = self.decorator.as_ref() else {
            return Ok(context);
        };

        let expected = context.id();
        let decorated = decorator.decorate(context);
        if decorated.id() != expected {
            return Err(ConstructionError::IdentityReplaced {
                expected,
                actual: decorated.id(),
            });
        }
        Ok(decorated)
    }

    /// Builds the request and starts its `"request"` timing.
    ///
    /// # Errors
    ///
    /// Propagates decorator and context factory failures.
    pub fn build(
        &self,
        native_request: F::NativeRequest,
    ) -> Result<HttpRequestMessage, ConstructionError> {
        let context = Arc::new(self.build_context()?);
        let request = self.factory.create(context, native_request)?;

        request.context().timings().request().start();
        debug!(
            request_id = %request.context().id(),
            method = %request.method(),
            path = %request.path(),
            "Request built"
        );

        Ok(request)
    }
}

impl<F: ContextFactory> std::fmt::Debug for ContextBuilder<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("has_decorator", &self.has_decorator())
            .finish()
    }
}
