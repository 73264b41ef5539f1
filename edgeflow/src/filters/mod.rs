//! Filter stages and the executor contract.
//!
//! The pipeline applies three named stages in fixed order. Each stage is
//! handed the previous stage's pending result as a [`MessageFuture`] and
//! returns a new one; the executor decides how and where filters run.

mod chain;

pub use chain::{Filter, FnFilter, StagedFilterExecutor};

use crate::errors::StageFailure;
use crate::message::Message;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pending single-value result flowing between stages.
pub type MessageFuture = BoxFuture<'static, Result<Message, StageFailure>>;

/// Wraps a ready message as the initial value of a chain.
#[must_use]
pub fn just(message: Message) -> MessageFuture {
    futures::future::ready(Ok(message)).boxed()
}

/// A named phase of filter application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// Filters applied to the request before it reaches the endpoint.
    Inbound,
    /// The filter that turns a request into a response.
    Endpoint,
    /// Filters applied to the response.
    Outbound,
}

impl FilterStage {
    /// All stages in execution order.
    pub const ALL: [Self; 3] = [Self::Inbound, Self::Endpoint, Self::Outbound];

    /// Returns the stage name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Endpoint => "endpoint",
            Self::Outbound => "outbound",
        }
    }

    /// Returns the name of the timing interval recorded for this stage.
    #[must_use]
    pub fn timing_name(&self) -> &'static str {
        match self {
            Self::Inbound => "filters.inbound",
            Self::Endpoint => "filters.endpoint",
            Self::Outbound => "filters.outbound",
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies a stage of filters to a pending message.
///
/// Implementations must yield exactly one message or one error for the
/// single message they receive, keep the message's session context, and are
/// free to suspend for as long as they need. The pipeline imposes no timeout.
pub trait FilterStageExecutor: Send + Sync {
    /// Applies `stage` to the result of `chain`.
    fn apply(&self, stage: FilterStage, chain: MessageFuture) -> MessageFuture;

    /// Applies the inbound stage.
    fn apply_inbound_filters(&self, chain: MessageFuture) -> MessageFuture {
        self.apply(FilterStage::Inbound, chain)
    }

    /// Applies the endpoint stage.
    fn apply_endpoint_filter(&self, chain: MessageFuture) -> MessageFuture {
        self.apply(FilterStage::Endpoint, chain)
    }

    /// Applies the outbound stage.
    fn apply_outbound_filters(&self, chain: MessageFuture) -> MessageFuture {
        self.apply(FilterStage::Outbound, chain)
    }
}
