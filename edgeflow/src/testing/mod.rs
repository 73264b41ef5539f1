//! Testing utilities for edgeflow processors.
//!
//! This module provides:
//! - An in-memory transport ([`StubContextFactory`]) with scriptable write failures
//! - Recording cleaner and completion handler
//! - A scripted filter executor

mod fixtures;
mod mocks;

pub use fixtures::{
    CreatedContext, NativeRequest, NativeResponse, StubContextFactory, WrittenResponse,
};
pub use mocks::{RecordingCleaner, RecordingCompleteHandler, ScriptedExecutor, StageScript};
