//! An in-memory transport for driving the processor in tests.

use crate::context::SessionContext;
use crate::errors::{ConstructionError, WriteFailure};
use crate::message::{HttpRequestMessage, HttpResponseMessage, Message};
use crate::processor::{ContextFactory, WriteFuture};
use bytes::Bytes;
use futures::FutureExt;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A native request as a transport would hand it over.
#[derive(Debug, Clone)]
pub struct NativeRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    malformed: Option<String>,
}

impl NativeRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            malformed: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a POST request with a body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let mut request = Self::new(Method::POST, path);
        request.body = body.into();
        request
    }

    /// Creates a request the factory refuses to wrap.
    #[must_use]
    pub fn malformed() -> Self {
        let mut request = Self::get("/");
        request.malformed = Some("unparseable request line".to_string());
        request
    }

    /// Sets the query string.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
        self
    }
}

#[derive(Debug, Clone)]
enum WriteMode {
    Accept,
    Reject(String),
    FailAsync(String),
    Panic(String),
    PanicAsync(String),
}

/// What reached the wire.
#[derive(Debug, Clone)]
pub struct WrittenResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

/// A native response channel that records what was written to it.
///
/// Clones share the recording, so a test can keep one handle and give the
/// other to the processor.
#[derive(Debug, Clone)]
pub struct NativeResponse {
    mode: WriteMode,
    written: Arc<Mutex<Option<WrittenResponse>>>,
}

impl Default for NativeResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeResponse {
    /// Creates a channel that accepts writes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(WriteMode::Accept)
    }

    /// Creates a channel whose write is refused before it starts.
    #[must_use]
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self::with_mode(WriteMode::Reject(message.into()))
    }

    /// Creates a channel whose write fails after it started.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_mode(WriteMode::FailAsync(message.into()))
    }

    /// Creates a channel that panics when a write is started.
    #[must_use]
    pub fn panicking(message: impl Into<String>) -> Self {
        Self::with_mode(WriteMode::Panic(message.into()))
    }

    /// Creates a channel that panics while the write is in flight.
    #[must_use]
    pub fn panicking_async(message: impl Into<String>) -> Self {
        Self::with_mode(WriteMode::PanicAsync(message.into()))
    }

    fn with_mode(mode: WriteMode) -> Self {
        Self {
            mode,
            written: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns what was written, if anything.
    #[must_use]
    pub fn written(&self) -> Option<WrittenResponse> {
        self.written.lock().clone()
    }

    fn write(self, response: HttpResponseMessage) -> Result<WriteFuture, WriteFailure> {
        match self.mode {
            WriteMode::Accept => {
                let written = self.written;
                Ok(async move {
                    *written.lock() = Some(WrittenResponse {
                        status: response.status(),
                        headers: response.headers().clone(),
                        body: response.body().clone(),
                    });
                    Ok(response)
                }
                .boxed())
            }
            WriteMode::Reject(message) => Err(WriteFailure::new(message)),
            WriteMode::FailAsync(message) => {
                Ok(async move { Err(WriteFailure::new(message)) }.boxed())
            }
            WriteMode::Panic(message) => panic!("{message}"),
            WriteMode::PanicAsync(message) => Ok(async move { explode(&message) }.boxed()),
        }
    }
}

fn explode(message: &str) -> Result<HttpResponseMessage, WriteFailure> {
    panic!("{message}")
}

/// The context as the factory saw it in `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedContext {
    /// Context id.
    pub id: Uuid,
    /// True if the context carried no attributes and no timings.
    pub was_pristine: bool,
}

/// A [`ContextFactory`] over [`NativeRequest`] and [`NativeResponse`].
#[derive(Debug, Default)]
pub struct StubContextFactory {
    created: Mutex<Vec<CreatedContext>>,
    writes: AtomicUsize,
}

impl StubContextFactory {
    /// Creates a factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every context passed to `create`, in order.
    #[must_use]
    pub fn created_contexts(&self) -> Vec<CreatedContext> {
        self.created.lock().clone()
    }

    /// Returns how many writes were attempted.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ContextFactory for StubContextFactory {
    type NativeRequest = NativeRequest;
    type NativeResponse = NativeResponse;

    fn create(
        &self,
        context: Arc<SessionContext>,
        native_request: NativeRequest,
    ) -> Result<HttpRequestMessage, ConstructionError> {
        if let Some(reason) = native_request.malformed {
            return Err(ConstructionError::malformed(reason));
        }

        self.created.lock().push(CreatedContext {
            id: context.id(),
            was_pristine: context.is_pristine(),
        });

        let mut request =
            HttpRequestMessage::new(context, native_request.method, native_request.path)
                .with_headers(native_request.headers)
                .with_body(native_request.body);
        if let Some(query) = native_request.query {
            request = request.with_query(query);
        }
        Ok(request)
    }

    fn write(
        &self,
        message: Message,
        native_response: NativeResponse,
    ) -> Result<WriteFuture, WriteFailure> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let response = message.into_response().map_err(|message| {
            WriteFailure::new(format!(
                "cannot write a request message: {}",
                message.info_for_logging()
            ))
        })?;
        native_response.write(response)
    }
}
