//! Observability utilities: tracing setup and event payloads.

mod logging;
mod payloads;

pub use logging::{directive_filter, init_tracing};
pub use payloads::{completion_payload, request_payload, stage_payload};
