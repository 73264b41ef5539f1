//! Recording collaborators and a scripted filter executor.

use crate::context::SessionContext;
use crate::errors::StageFailure;
use crate::filters::{FilterStage, FilterStageExecutor, MessageFuture};
use crate::message::{HttpRequestMessage, HttpResponseMessage};
use crate::processor::{RequestCompleteHandler, SessionCleaner};
use futures::FutureExt;
use http::StatusCode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A session cleaner that records each call.
#[derive(Debug, Default)]
pub struct RecordingCleaner {
    cleaned: Mutex<Vec<Uuid>>,
    error: Option<String>,
}

impl RecordingCleaner {
    /// Creates a cleaner that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cleaner that records the call and then fails.
    #[must_use]
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            cleaned: Mutex::new(Vec::new()),
            error: Some(error.into()),
        }
    }

    /// Returns the number of cleanups.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.cleaned.lock().len()
    }

    /// Returns the ids of the cleaned contexts.
    #[must_use]
    pub fn cleaned_ids(&self) -> Vec<Uuid> {
        self.cleaned.lock().clone()
    }
}

impl SessionCleaner for RecordingCleaner {
    fn cleanup(&self, context: &SessionContext) -> anyhow::Result<()> {
        self.cleaned.lock().push(context.id());
        match &self.error {
            Some(error) => Err(anyhow::anyhow!("{error}")),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum HandlerMode {
    #[default]
    Succeed,
    Fail,
    Panic,
}

/// A completion handler that records every response it is given.
#[derive(Debug, Default)]
pub struct RecordingCompleteHandler {
    responses: Mutex<Vec<HttpResponseMessage>>,
    mode: HandlerMode,
}

impl RecordingCompleteHandler {
    /// Creates a handler that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handler that records the response and then fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            mode: HandlerMode::Fail,
        }
    }

    /// Creates a handler that records the response and then panics.
    #[must_use]
    pub fn panicking() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            mode: HandlerMode::Panic,
        }
    }

    /// Returns the number of notifications.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.responses.lock().len()
    }

    /// Returns the recorded responses.
    #[must_use]
    pub fn responses(&self) -> Vec<HttpResponseMessage> {
        self.responses.lock().clone()
    }
}

impl RequestCompleteHandler for RecordingCompleteHandler {
    fn handle(&self, response: &HttpResponseMessage) -> anyhow::Result<()> {
        self.responses.lock().push(response.clone());
        match self.mode {
            HandlerMode::Succeed => Ok(()),
            HandlerMode::Fail => anyhow::bail!("metrics backend unavailable"),
            HandlerMode::Panic => panic!("completion handler exploded"),
        }
    }
}

/// What a [`ScriptedExecutor`] does for one stage.
#[derive(Debug, Clone)]
pub enum StageScript {
    /// Pass the message through unchanged.
    PassThrough,
    /// Answer the request with an empty response of this status.
    Respond(StatusCode),
    /// Fail the stage with this message.
    Fail(String),
    /// Never complete.
    Pending,
    /// Wait, then pass the message through.
    Delay(Duration),
}

/// A [`FilterStageExecutor`] whose stages follow a fixed script.
///
/// Stages without a script pass the message through. Each stage that runs
/// (that is, whose upstream succeeded) is recorded.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<FilterStage, StageScript>,
    executed: Arc<Mutex<Vec<FilterStage>>>,
    seen_contexts: Arc<Mutex<Vec<Arc<SessionContext>>>>,
    seen_requests: Arc<Mutex<Vec<Arc<HttpRequestMessage>>>>,
}

impl ScriptedExecutor {
    /// Creates an executor that passes everything through.
    #[must_use]
    pub fn pass_through() -> Self {
        Self::default()
    }

    /// Creates an executor whose endpoint responds with `status`.
    #[must_use]
    pub fn responding(status: StatusCode) -> Self {
        Self::default().with_stage(FilterStage::Endpoint, StageScript::Respond(status))
    }

    /// Scripts one stage.
    #[must_use]
    pub fn with_stage(mut self, stage: FilterStage, script: StageScript) -> Self {
        self.scripts.insert(stage, script);
        self
    }

    /// Returns the stages that ran, in order.
    #[must_use]
    pub fn executed_stages(&self) -> Vec<FilterStage> {
        self.executed.lock().clone()
    }

    /// Returns the context of the message each executed stage received.
    #[must_use]
    pub fn seen_contexts(&self) -> Vec<Arc<SessionContext>> {
        self.seen_contexts.lock().clone()
    }

    /// Returns the outbound request of every message the endpoint answered.
    #[must_use]
    pub fn answered_requests(&self) -> Vec<Arc<HttpRequestMessage>> {
        self.seen_requests.lock().clone()
    }
}

impl FilterStageExecutor for ScriptedExecutor {
    fn apply(&self, stage: FilterStage, chain: MessageFuture) -> MessageFuture {
        let script = self
            .scripts
            .get(&stage)
            .cloned()
            .unwrap_or(StageScript::PassThrough);
        let executed = self.executed.clone();
        let seen_contexts = self.seen_contexts.clone();
        let seen_requests = self.seen_requests.clone();

        async move {
            let message = chain.await?;
            executed.lock().push(stage);
            seen_contexts.lock().push(message.context().clone());

            match script {
                StageScript::PassThrough => Ok(message),
                StageScript::Respond(status) => {
                    let outbound_request = message.outbound_request();
                    seen_requests.lock().push(outbound_request.clone());
                    Ok(HttpResponseMessage::new(outbound_request, status).into())
                }
                StageScript::Fail(error) => Err(StageFailure::new(stage, error)),
                StageScript::Pending => {
                    futures::future::pending::<()>().await;
                    Ok(message)
                }
                StageScript::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(message)
                }
            }
        }
        .boxed()
    }
}
