//! The request processor and the collaborator contracts it consumes.
//!
//! An [`HttpProcessor`] owns one pipeline configuration and is shared across
//! concurrent requests. Each call to [`HttpProcessor::process`] builds a
//! fresh [`SessionContext`](crate::context::SessionContext), runs the
//! inbound, endpoint and outbound filter stages, writes the response and
//! runs the [`SessionCleaner`] exactly once.

mod builder;
mod engine;
mod guard;
mod ports;

#[cfg(test)]
mod integration_tests;

pub use builder::HttpProcessorBuilder;
pub use engine::HttpProcessor;
#[cfg(test)]
pub use ports::{MockRequestCompleteHandler, MockSessionCleaner};
pub use ports::{
    ContextFactory, NoOpSessionCleaner, RequestCompleteHandler, SessionCleaner, WriteFuture,
};
