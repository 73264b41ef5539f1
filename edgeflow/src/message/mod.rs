//! Messages flowing through the filter pipeline.
//!
//! A pipeline run starts with a [`Message::Request`]; the endpoint stage turns
//! it into a [`Message::Response`].

mod request;
mod response;

pub use request::HttpRequestMessage;
pub use response::HttpResponseMessage;

use crate::context::SessionContext;
use std::sync::Arc;

/// The value passed between filter stages.
#[derive(Debug, Clone)]
pub enum Message {
    /// A request that has not reached the endpoint yet.
    Request(HttpRequestMessage),
    /// A response produced by the endpoint stage.
    Response(HttpResponseMessage),
}

impl Message {
    /// Returns the session context.
    #[must_use]
    pub fn context(&self) -> &Arc<SessionContext> {
        match self {
            Self::Request(req) => req.context(),
            Self::Response(resp) => resp.context(),
        }
    }

    /// Returns the request this message originates from.
    ///
    /// For a request message that is the request itself.
    #[must_use]
    pub fn outbound_request(&self) -> Arc<HttpRequestMessage> {
        match self {
            Self::Request(req) => Arc::new(req.clone()),
            Self::Response(resp) => resp.outbound_request().clone(),
        }
    }

    /// Returns true for a response message.
    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Returns the response, if this is one.
    #[must_use]
    pub fn as_response(&self) -> Option<&HttpResponseMessage> {
        match self {
            Self::Response(resp) => Some(resp),
            Self::Request(_) => None,
        }
    }

    /// Returns the request, if this is one.
    #[must_use]
    pub fn as_request(&self) -> Option<&HttpRequestMessage> {
        match self {
            Self::Request(req) => Some(req),
            Self::Response(_) => None,
        }
    }

    /// Converts into the response, if this is one.
    ///
    /// # Errors
    ///
    /// Returns the original message when it is a request.
    pub fn into_response(self) -> Result<HttpResponseMessage, Self> {
        match self {
            Self::Response(resp) => Ok(resp),
            other @ Self::Request(_) => Err(other),
        }
    }

    /// Returns a compact one-line description for log messages.
    #[must_use]
    pub fn info_for_logging(&self) -> String {
        match self {
            Self::Request(req) => req.info_for_logging(),
            Self::Response(resp) => resp.info_for_logging(),
        }
    }
}

impl From<HttpRequestMessage> for Message {
    fn from(req: HttpRequestMessage) -> Self {
        Self::Request(req)
    }
}

impl From<HttpResponseMessage> for Message {
    fn from(resp: HttpResponseMessage) -> Self {
        Self::Response(resp)
    }
}
