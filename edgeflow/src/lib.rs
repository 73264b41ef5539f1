//! # Edgeflow
//!
//! The request-processing core of an HTTP edge gateway.
//!
//! Every inbound request is wrapped in a fresh [`SessionContext`](context::SessionContext)
//! and driven through three filter stages:
//!
//! - **Inbound**: authentication, routing, request rewriting
//! - **Endpoint**: turns the request into a response (proxying, static replies)
//! - **Outbound**: response rewriting, compression, headers
//!
//! The final message is written to the transport. A failed write becomes a
//! synthesized 500 response, completion is reported to an optional handler,
//! and the session cleaner runs exactly once per request, including when
//! the caller drops the run before it finishes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use edgeflow::prelude::*;
//!
//! let processor = HttpProcessor::builder(Arc::new(MyTransport::new()))
//!     .filter_executor(Arc::new(executor))
//!     .session_cleaner(Arc::new(NoOpSessionCleaner))
//!     .build()?;
//!
//! let response = processor.process(native_request, native_response).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod filters;
pub mod message;
pub mod observability;
pub mod processor;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{LoggingConfig, ProcessorConfig};
    pub use crate::context::{
        AttributeBag, ContextBuilder, SessionContext, SessionContextDecorator, SessionIdentity,
        Timing, Timings,
    };
    pub use crate::errors::{ConstructionError, PipelineError, StageFailure, WriteFailure};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::filters::{
        Filter, FilterStage, FilterStageExecutor, FnFilter, MessageFuture, StagedFilterExecutor,
    };
    pub use crate::message::{HttpRequestMessage, HttpResponseMessage, Message};
    pub use crate::observability::init_tracing;
    pub use crate::processor::{
        ContextFactory, HttpProcessor, HttpProcessorBuilder, NoOpSessionCleaner,
        RequestCompleteHandler, SessionCleaner, WriteFuture,
    };
}
