//! Scoped cleanup for a pipeline run.

use super::SessionCleaner;
use crate::context::SessionContext;
use crate::events::EventSink;
use crate::observability::request_payload;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Runs the session cleaner when dropped.
///
/// Acquired as soon as the request is built, so cleanup happens on normal
/// completion, on error and when the run's future is dropped mid-flight.
pub(crate) struct RunGuard {
    context: Arc<SessionContext>,
    cleaner: Arc<dyn SessionCleaner>,
    events: Arc<dyn EventSink>,
    completed: bool,
}

impl RunGuard {
    pub(crate) fn new(
        context: Arc<SessionContext>,
        cleaner: Arc<dyn SessionCleaner>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            context,
            cleaner,
            events,
            completed: false,
        }
    }

    /// Marks the run as having reached a terminal value or error.
    pub(crate) fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let request_id = self.context.id();

        if !self.completed {
            warn!(%request_id, "Pipeline run cancelled before completion");
        }

        let ended = self.context.timings().end_all_running();
        if !ended.is_empty() {
            debug!(%request_id, timings = ?ended, "Ended timings left running");
        }

        let cleaned = run_cleaner(self.cleaner.as_ref(), &self.context);

        self.events.try_emit(
            "request.cleanup",
            Some(request_payload(
                &self.context,
                serde_json::json!({
                    "cancelled": !self.completed,
                    "cleaned": cleaned,
                }),
            )),
        );
    }
}

/// Invokes the cleaner, containing errors and panics. Returns true on success.
pub(crate) fn run_cleaner(cleaner: &dyn SessionCleaner, context: &SessionContext) -> bool {
    match catch_unwind(AssertUnwindSafe(|| cleaner.cleanup(context))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            let message = format!("{e:#}");
            error!(request_id = %context.id(), error = %message, "Error in session cleaner");
            false
        }
        Err(panic) => {
            error!(
                request_id = %context.id(),
                panic = %panic_message(panic.as_ref()),
                "Session cleaner panicked"
            );
            false
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
