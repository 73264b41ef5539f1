//! Lifecycle events emitted by the request pipeline.
//!
//! The processor reports each transition of a pipeline run to an
//! [`EventSink`]. Event types:
//!
//! - `request.started`, `request.completed`, `request.failed`, `request.cleanup`
//! - `stage.started`, `stage.completed`, `stage.failed`
//! - `response.written`, `response.fallback`

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
