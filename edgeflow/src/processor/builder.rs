//! Builder for [`HttpProcessor`].

use super::{ContextFactory, HttpProcessor, RequestCompleteHandler, SessionCleaner};
use crate::config::ProcessorConfig;
use crate::context::{ContextBuilder, SessionContextDecorator};
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink};
use crate::filters::FilterStageExecutor;
use std::sync::Arc;
use tracing::debug;

/// Collects the collaborators of an [`HttpProcessor`].
///
/// The filter executor and the session cleaner are required. The decorator,
/// completion handler and event sink are optional.
pub struct HttpProcessorBuilder<F: ContextFactory> {
    factory: Arc<F>,
    config: ProcessorConfig,
    executor: Option<Arc<dyn FilterStageExecutor>>,
    decorator: Option<Arc<dyn SessionContextDecorator>>,
    complete_handler: Option<Arc<dyn RequestCompleteHandler>>,
    session_cleaner: Option<Arc<dyn SessionCleaner>>,
    events: Option<Arc<dyn EventSink>>,
}

impl<F: ContextFactory> HttpProcessorBuilder<F> {
    /// Creates a builder around a context factory.
    #[must_use]
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            factory,
            config: ProcessorConfig::default(),
            executor: None,
            decorator: None,
            complete_handler: None,
            session_cleaner: None,
            events: None,
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the filter stage executor.
    #[must_use]
    pub fn filter_executor(mut self, executor: Arc<dyn FilterStageExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets the session context decorator.
    #[must_use]
    pub fn decorator(mut self, decorator: Arc<dyn SessionContextDecorator>) -> Self {
        self.decorator = Some(decorator);
        self
    }

    /// Sets the request completion handler.
    #[must_use]
    pub fn request_complete_handler(mut self, handler: Arc<dyn RequestCompleteHandler>) -> Self {
        self.complete_handler = Some(handler);
        self
    }

    /// Sets the session cleaner.
    #[must_use]
    pub fn session_cleaner(mut self, cleaner: Arc<dyn SessionCleaner>) -> Self {
        self.session_cleaner = Some(cleaner);
        self
    }

    /// Sets the event sink. Defaults to a no-op sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Builds the processor.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required collaborator is missing
    /// or the configuration is invalid.
    pub fn build(self) -> Result<HttpProcessor<F>, PipelineError> {
        self.config.validate()?;

        let executor = self
            .executor
            .ok_or_else(|| PipelineError::config("a filter stage executor is required"))?;
        let session_cleaner = self
            .session_cleaner
            .ok_or_else(|| PipelineError::config("a session cleaner is required"))?;

        let events: Arc<dyn EventSink> = match self.events {
            Some(sink) if self.config.emit_events => sink,
            _ => Arc::new(NoOpEventSink),
        };

        let mut context_builder = ContextBuilder::new(self.factory);
        if let Some(decorator) = self.decorator {
            context_builder = context_builder.with_decorator(decorator);
        }

        debug!(
            processor = %self.config.name,
            has_decorator = context_builder.has_decorator(),
            has_complete_handler = self.complete_handler.is_some(),
            "HttpProcessor built"
        );

        Ok(HttpProcessor {
            config: self.config,
            context_builder,
            executor,
            complete_handler: self.complete_handler,
            session_cleaner,
            events,
        })
    }
}
