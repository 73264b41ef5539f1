//! Session context management for a pipeline run.
//!
//! This module provides:
//! - The per-request [`SessionContext`] and its identity
//! - A thread-safe attribute bag shared by every stage
//! - Named timing intervals
//! - The [`ContextBuilder`] that turns a native request into a request message

mod bags;
mod builder;
mod session;
mod timing;

pub use bags::AttributeBag;
pub use builder::{ContextBuilder, SessionContextDecorator};
pub use session::{SessionContext, SessionIdentity};
pub use timing::{Timing, TimingSnapshot, Timings, REQUEST_TIMING};
