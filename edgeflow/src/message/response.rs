//! Outbound HTTP response message.

use super::HttpRequestMessage;
use crate::context::SessionContext;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::sync::Arc;

/// The internal representation of a response produced by the endpoint stage.
#[derive(Debug, Clone)]
pub struct HttpResponseMessage {
    context: Arc<SessionContext>,
    outbound_request: Arc<HttpRequestMessage>,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    fallback: bool,
}

impl HttpResponseMessage {
    /// Creates a response answering `outbound_request`.
    ///
    /// The response shares the request's context.
    #[must_use]
    pub fn new(outbound_request: Arc<HttpRequestMessage>, status: StatusCode) -> Self {
        Self {
            context: outbound_request.context().clone(),
            outbound_request,
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            fallback: false,
        }
    }

    /// Creates the 500 response substituted when writing a response fails.
    #[must_use]
    pub fn fallback(
        context: Arc<SessionContext>,
        outbound_request: Arc<HttpRequestMessage>,
    ) -> Self {
        Self {
            context,
            outbound_request,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            fallback: true,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the session context.
    #[must_use]
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// Returns the request this response answers.
    #[must_use]
    pub fn outbound_request(&self) -> &Arc<HttpRequestMessage> {
        &self.outbound_request
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Returns true if this response was synthesized after a write failure.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Returns a compact one-line description for log messages.
    #[must_use]
    pub fn info_for_logging(&self) -> String {
        format!(
            "{}, status={}",
            self.outbound_request.info_for_logging(),
            self.status.as_u16()
        )
    }
}
