//! In-order filter executor.

use super::{FilterStage, FilterStageExecutor, MessageFuture};
use crate::errors::{PipelineError, StageFailure};
use crate::message::Message;
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A single filter bound to one stage.
#[async_trait]
pub trait Filter: Send + Sync + Debug {
    /// Returns the filter name.
    fn name(&self) -> &str;

    /// Returns the stage this filter belongs to.
    fn stage(&self) -> FilterStage;

    /// Returns the ordering key within the stage (lower runs first).
    fn order(&self) -> i32 {
        0
    }

    /// Returns false to skip this filter for the given message.
    fn should_filter(&self, _message: &Message) -> bool {
        true
    }

    /// Applies the filter.
    async fn apply(&self, message: Message) -> anyhow::Result<Message>;
}

/// A simple function-based filter.
pub struct FnFilter<F>
where
    F: Fn(Message) -> anyhow::Result<Message> + Send + Sync,
{
    name: String,
    stage: FilterStage,
    order: i32,
    func: F,
}

impl<F> FnFilter<F>
where
    F: Fn(Message) -> anyhow::Result<Message> + Send + Sync,
{
    /// Creates a new function-based filter.
    pub fn new(name: impl Into<String>, stage: FilterStage, func: F) -> Self {
        Self {
            name: name.into(),
            stage,
            order: 0,
            func,
        }
    }

    /// Sets the ordering key.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl<F> Debug for FnFilter<F>
where
    F: Fn(Message) -> anyhow::Result<Message> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFilter")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("order", &self.order)
            .finish()
    }
}

#[async_trait]
impl<F> Filter for FnFilter<F>
where
    F: Fn(Message) -> anyhow::Result<Message> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn stage(&self) -> FilterStage {
        self.stage
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn apply(&self, message: Message) -> anyhow::Result<Message> {
        (self.func)(message)
    }
}

/// Runs the filters registered for a stage one after another, in order.
///
/// The endpoint stage must produce a response message.
#[derive(Debug, Default, Clone)]
pub struct StagedFilterExecutor {
    filters: HashMap<FilterStage, Vec<Arc<dyn Filter>>>,
    filter_timeout: Option<Duration>,
}

impl StagedFilterExecutor {
    /// Creates an executor with no filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if a filter with the same name is already
    /// registered for the same stage.
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Result<Self, PipelineError> {
        self.add_filter(filter)?;
        Ok(self)
    }

    /// Registers a filter in place.
    ///
    /// # Errors
    ///
    /// Returns an error on a duplicate name within the stage.
    pub fn add_filter(&mut self, filter: Arc<dyn Filter>) -> Result<(), PipelineError> {
        let stage_filters = self.filters.entry(filter.stage()).or_default();
        if stage_filters.iter().any(|f| f.name() == filter.name()) {
            return Err(PipelineError::config(format!(
                "Filter '{}' is already registered for the {} stage",
                filter.name(),
                filter.stage()
            )));
        }
        stage_filters.push(filter);
        stage_filters.sort_by_key(|f| f.order());
        Ok(())
    }

    /// Sets a per-filter timeout.
    #[must_use]
    pub fn with_filter_timeout(mut self, timeout: Duration) -> Self {
        self.filter_timeout = Some(timeout);
        self
    }

    /// Returns the filter names for a stage in execution order.
    #[must_use]
    pub fn filter_names(&self, stage: FilterStage) -> Vec<String> {
        self.filters
            .get(&stage)
            .map(|filters| filters.iter().map(|f| f.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Returns the total number of registered filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.values().map(Vec::len).sum()
    }

    /// Returns true if no filters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn run_filter(
        filter: &Arc<dyn Filter>,
        stage: FilterStage,
        message: Message,
        timeout: Option<Duration>,
    ) -> Result<Message, StageFailure> {
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, filter.apply(message)).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(StageFailure::new(
                        stage,
                        format!("timed out after {}ms", limit.as_millis()),
                    )
                    .with_filter(filter.name()));
                }
            },
            None => filter.apply(message).await,
        };

        result.map_err(|e| StageFailure::new(stage, format!("{e:#}")).with_filter(filter.name()))
    }
}

impl FilterStageExecutor for StagedFilterExecutor {
    fn apply(&self, stage: FilterStage, chain: MessageFuture) -> MessageFuture {
        let filters = self.filters.get(&stage).cloned().unwrap_or_default();
        let timeout = self.filter_timeout;

        async move {
            let mut message = chain.await?;

            for filter in &filters {
                if !filter.should_filter(&message) {
                    debug!(filter = filter.name(), stage = %stage, "Filter skipped");
                    continue;
                }
                message = Self::run_filter(filter, stage, message, timeout).await?;
            }

            if stage == FilterStage::Endpoint && !message.is_response() {
                warn!(
                    request = %message.info_for_logging(),
                    "Endpoint stage did not produce a response"
                );
                return Err(StageFailure::new(stage, "endpoint produced no response"));
            }

            Ok(message)
        }
        .boxed()
    }
}
