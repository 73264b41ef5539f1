//! The request pipeline orchestrator.

use super::guard::{panic_message, RunGuard};
use super::{ContextFactory, HttpProcessorBuilder, RequestCompleteHandler, SessionCleaner};
use crate::config::ProcessorConfig;
use crate::context::{ContextBuilder, SessionContext};
use crate::errors::{PipelineError, StageFailure, WriteFailure};
use crate::events::EventSink;
use crate::filters::{self, FilterStage, FilterStageExecutor, MessageFuture};
use crate::message::{HttpRequestMessage, HttpResponseMessage, Message};
use crate::observability::{completion_payload, request_payload, stage_payload};
use futures::FutureExt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info_span, warn, Instrument};

/// Timing interval covering the response write.
const WRITE_TIMING: &str = "write";

/// Drives one inbound request through the inbound, endpoint and outbound
/// filter stages, writes the response and guarantees cleanup.
///
/// A run ends in one of three ways:
///
/// - the written response (`Ok`),
/// - a synthesized 500 response when writing failed (`Ok`, `is_fallback()`),
/// - a construction or stage failure (`Err`).
///
/// In every case except a construction failure the session cleaner runs
/// exactly once, including when the returned future is dropped early.
pub struct HttpProcessor<F: ContextFactory> {
    pub(super) config: ProcessorConfig,
    pub(super) context_builder: ContextBuilder<F>,
    pub(super) executor: Arc<dyn FilterStageExecutor>,
    pub(super) complete_handler: Option<Arc<dyn RequestCompleteHandler>>,
    pub(super) session_cleaner: Arc<dyn SessionCleaner>,
    pub(super) events: Arc<dyn EventSink>,
}

impl<F: ContextFactory> HttpProcessor<F> {
    /// Starts building a processor around a context factory.
    #[must_use]
    pub fn builder(factory: Arc<F>) -> HttpProcessorBuilder<F> {
        HttpProcessorBuilder::new(factory)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Returns the context factory.
    #[must_use]
    pub fn factory(&self) -> &Arc<F> {
        self.context_builder.factory()
    }

    /// Processes one request.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Construction`] if the request could not be
    /// built (no stage runs and no cleanup applies) and
    /// [`PipelineError::Stage`] if a filter stage failed. A failed write is
    /// not an error: it yields a fallback 500 response.
    pub async fn process(
        &self,
        native_request: F::NativeRequest,
        native_response: F::NativeResponse,
    ) -> Result<HttpResponseMessage, PipelineError> {
        let request = self.context_builder.build(native_request)?;

        let span = info_span!(
            "request",
            processor = %self.config.name,
            request_id = %request.context().id(),
        );
        self.run(request, native_response).instrument(span).await
    }

    async fn run(
        &self,
        request: HttpRequestMessage,
        native_response: F::NativeResponse,
    ) -> Result<HttpResponseMessage, PipelineError> {
        let context = request.context().clone();
        let request_info = request.info_for_logging();
        let mut guard = RunGuard::new(
            context.clone(),
            self.session_cleaner.clone(),
            self.events.clone(),
        );

        self.events.try_emit(
            "request.started",
            Some(request_payload(
                &context,
                serde_json::json!({
                    "method": request.method().as_str(),
                    "path": request.path(),
                }),
            )),
        );

        let outcome = match self.filter_chain(request).await {
            Ok(message) => {
                let response = self
                    .write_response(message, native_response, &context, &request_info)
                    .await;
                self.notify_complete(&response, &request_info);
                self.events
                    .try_emit("request.completed", Some(completion_payload(&response)));
                Ok(response)
            }
            Err(failure) => {
                context.timings().request().end();
                error!(
                    request = %request_info,
                    stage = %failure.stage,
                    error = %failure,
                    "Unexpected error in filter chain"
                );
                self.events.try_emit(
                    "request.failed",
                    Some(stage_payload(
                        &context,
                        failure.stage,
                        context.timings().request().duration_ms(),
                        Some(&failure.to_string()),
                    )),
                );
                Err(PipelineError::Stage(failure))
            }
        };

        guard.complete();
        outcome
    }

    /// Composes the three stages over the built request.
    fn filter_chain(&self, request: HttpRequestMessage) -> MessageFuture {
        let context = request.context().clone();
        let mut chain = filters::just(Message::Request(request));
        for stage in FilterStage::ALL {
            chain = self.apply_stage(stage, chain, &context);
        }
        chain
    }

    /// Applies one stage, bracketing it with its timing and events.
    ///
    /// A panic inside the stage becomes a [`StageFailure`] for that stage.
    fn apply_stage(
        &self,
        stage: FilterStage,
        chain: MessageFuture,
        context: &Arc<SessionContext>,
    ) -> MessageFuture {
        let timing = context.timings().get(stage.timing_name());

        let upstream = {
            let timing = timing.clone();
            let events = self.events.clone();
            let context = context.clone();
            async move {
                let result = chain.await;
                if result.is_ok() {
                    timing.start();
                    events.try_emit(
                        "stage.started",
                        Some(stage_payload(&context, stage, None, None)),
                    );
                }
                result
            }
            .boxed()
        };

        let applied = match stage {
            FilterStage::Inbound => self.executor.apply_inbound_filters(upstream),
            FilterStage::Endpoint => self.executor.apply_endpoint_filter(upstream),
            FilterStage::Outbound => self.executor.apply_outbound_filters(upstream),
        };

        let events = self.events.clone();
        let context = context.clone();
        async move {
            let result = AssertUnwindSafe(applied)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = format!("filter panicked: {}", panic_message(panic.as_ref()));
                    warn!(stage = %stage, error = %message, "Filter stage panicked");
                    Err(StageFailure::new(stage, message))
                });

            if timing.is_running() && timing.end() {
                let duration_ms = timing.duration_ms();
                match &result {
                    Ok(_) => {
                        debug!(stage = %stage, duration_ms, "Filter stage completed");
                        events.try_emit(
                            "stage.completed",
                            Some(stage_payload(&context, stage, duration_ms, None)),
                        );
                    }
                    Err(failure) => {
                        events.try_emit(
                            "stage.failed",
                            Some(stage_payload(
                                &context,
                                stage,
                                duration_ms,
                                Some(&failure.to_string()),
                            )),
                        );
                    }
                }
            }
            result
        }
        .boxed()
    }

    /// Writes the outbound-filtered message, substituting a fallback 500
    /// response on any write failure. Ends the `"request"` timing.
    async fn write_response(
        &self,
        message: Message,
        native_response: F::NativeResponse,
        context: &Arc<SessionContext>,
        request_info: &str,
    ) -> HttpResponseMessage {
        let outbound_request = message.outbound_request();
        let write_timing = context.timings().get(WRITE_TIMING);
        write_timing.start();

        let result = self.try_write(message, native_response).await;

        write_timing.end();
        let response = match result {
            Ok(response) => {
                self.events.try_emit(
                    "response.written",
                    Some(request_payload(
                        context,
                        serde_json::json!({ "status": response.status().as_u16() }),
                    )),
                );
                response
            }
            Err(failure) => {
                error!(request = %request_info, error = %failure, "Error in writing response");
                self.events.try_emit(
                    "response.fallback",
                    Some(request_payload(
                        context,
                        serde_json::json!({ "error": failure.to_string() }),
                    )),
                );
                HttpResponseMessage::fallback(context.clone(), outbound_request)
            }
        };

        context.timings().request().end();
        response
    }

    /// Calls the writer, folding sync errors, async errors and panics into
    /// a single [`WriteFailure`].
    async fn try_write(
        &self,
        message: Message,
        native_response: F::NativeResponse,
    ) -> Result<HttpResponseMessage, WriteFailure> {
        let factory = self.context_builder.factory();
        let pending = catch_unwind(AssertUnwindSafe(|| factory.write(message, native_response)))
            .map_err(|panic| {
                WriteFailure::new(format!("writer panicked: {}", panic_message(panic.as_ref())))
            })??;

        AssertUnwindSafe(pending)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(WriteFailure::new(format!(
                    "writer panicked: {}",
                    panic_message(panic.as_ref())
                )))
            })
    }

    /// Invokes the completion handler, if any. Never fails the run.
    fn notify_complete(&self, response: &HttpResponseMessage, request_info: &str) {
        let Some(handler) = self.complete_handler.as_ref() else {
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| handler.handle(response))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let message = format!("{e:#}");
                error!(
                    request = %request_info,
                    error = %message,
                    "Error in RequestCompleteHandler"
                );
            }
            Err(panic) => {
                warn!(
                    request = %request_info,
                    panic = %panic_message(panic.as_ref()),
                    "RequestCompleteHandler panicked"
                );
            }
        }
    }
}

impl<F: ContextFactory> std::fmt::Debug for HttpProcessor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProcessor")
            .field("name", &self.config.name)
            .field("context_builder", &self.context_builder)
            .field("has_complete_handler", &self.complete_handler.is_some())
            .finish()
    }
}
