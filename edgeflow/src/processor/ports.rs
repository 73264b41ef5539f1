//! Collaborator contracts consumed by the processor.

use crate::context::SessionContext;
use crate::errors::{ConstructionError, WriteFailure};
use crate::message::{HttpRequestMessage, HttpResponseMessage, Message};
use futures::future::BoxFuture;
use std::sync::Arc;

/// A pending response write.
pub type WriteFuture = BoxFuture<'static, Result<HttpResponseMessage, WriteFailure>>;

/// Adapts between the transport's native types and pipeline messages.
pub trait ContextFactory: Send + Sync + 'static {
    /// The transport's inbound request type.
    type NativeRequest: Send + 'static;
    /// The transport's outbound channel type.
    type NativeResponse: Send + 'static;

    /// Wraps a native request together with its session context.
    ///
    /// # Errors
    ///
    /// Returns a construction error for malformed native input.
    fn create(
        &self,
        context: Arc<SessionContext>,
        native_request: Self::NativeRequest,
    ) -> Result<HttpRequestMessage, ConstructionError>;

    /// Writes the final message onto the native channel.
    ///
    /// A failure may be reported immediately through the outer `Err` or
    /// later through the returned future; the processor treats both alike.
    ///
    /// # Errors
    ///
    /// Returns a write failure if the write cannot be started.
    fn write(
        &self,
        message: Message,
        native_response: Self::NativeResponse,
    ) -> Result<WriteFuture, WriteFailure>;
}

/// Notified once per request after the response has been written.
#[cfg_attr(test, mockall::automock)]
pub trait RequestCompleteHandler: Send + Sync {
    /// Handles the written response. Errors are logged and ignored.
    fn handle(&self, response: &HttpResponseMessage) -> anyhow::Result<()>;
}

impl<F> RequestCompleteHandler for F
where
    F: Fn(&HttpResponseMessage) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, response: &HttpResponseMessage) -> anyhow::Result<()> {
        self(response)
    }
}

/// Releases per-request resources. Called exactly once per pipeline run.
#[cfg_attr(test, mockall::automock)]
pub trait SessionCleaner: Send + Sync {
    /// Cleans up the context. Errors are logged and ignored.
    fn cleanup(&self, context: &SessionContext) -> anyhow::Result<()>;
}

impl<F> SessionCleaner for F
where
    F: Fn(&SessionContext) -> anyhow::Result<()> + Send + Sync,
{
    fn cleanup(&self, context: &SessionContext) -> anyhow::Result<()> {
        self(context)
    }
}

/// A cleaner that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSessionCleaner;

impl SessionCleaner for NoOpSessionCleaner {
    fn cleanup(&self, _context: &SessionContext) -> anyhow::Result<()> {
        Ok(())
    }
}
