//! Named timing intervals recorded against a session context.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Name of the interval covering a whole pipeline run.
pub const REQUEST_TIMING: &str = "request";

#[derive(Debug, Default)]
struct TimingState {
    started: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    duration: Option<Duration>,
    ended_at: Option<DateTime<Utc>>,
}

/// A single start/end interval.
///
/// An interval can be started once and ended once. Repeated or out-of-order
/// calls are ignored and reported through the return value.
#[derive(Debug)]
pub struct Timing {
    name: String,
    state: Mutex<TimingState>,
}

impl Timing {
    /// Creates a new, not yet started interval.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(TimingState::default()),
        }
    }

    /// Returns the interval name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts the interval.
    ///
    /// Returns false if it was already started.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if state.started.is_some() {
            debug!(timing = %self.name, "Timing already started");
            return false;
        }
        state.started = Some(Instant::now());
        state.started_at = Some(Utc::now());
        true
    }

    /// Ends the interval.
    ///
    /// Returns false if it was never started or has already ended.
    pub fn end(&self) -> bool {
        let mut state = self.state.lock();
        let Some(started) = state.started else {
            debug!(timing = %self.name, "Timing ended before it was started");
            return false;
        };
        if state.duration.is_some() {
            debug!(timing = %self.name, "Timing already ended");
            return false;
        }
        state.duration = Some(started.elapsed());
        state.ended_at = Some(Utc::now());
        true
    }

    /// Returns true once the interval has been started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.lock().started.is_some()
    }

    /// Returns true while the interval is started but not ended.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let state = self.state.lock();
        state.started.is_some() && state.duration.is_none()
    }

    /// Returns true once the interval has been ended.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.lock().duration.is_some()
    }

    /// Returns the measured duration, if ended.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.state.lock().duration
    }

    /// Returns the measured duration in milliseconds, if ended.
    #[must_use]
    pub fn duration_ms(&self) -> Option<f64> {
        self.duration().map(|d| d.as_secs_f64() * 1000.0)
    }

    /// Takes a serializable snapshot of the interval.
    #[must_use]
    pub fn snapshot(&self) -> TimingSnapshot {
        let state = self.state.lock();
        TimingSnapshot {
            name: self.name.clone(),
            started_at: state.started_at,
            ended_at: state.ended_at,
            duration_ms: state.duration.map(|d| d.as_secs_f64() * 1000.0),
        }
    }
}

/// Serializable view of a [`Timing`].
#[derive(Debug, Clone, Serialize)]
pub struct TimingSnapshot {
    /// Interval name.
    pub name: String,
    /// Wall-clock start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Wall-clock end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

/// Registry of named intervals for one request.
///
/// The `"request"` interval always exists; others are created on first use.
#[derive(Debug)]
pub struct Timings {
    request: Arc<Timing>,
    named: DashMap<String, Arc<Timing>>,
}

impl Timings {
    /// Creates a registry holding only the request interval.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request: Arc::new(Timing::new(REQUEST_TIMING)),
            named: DashMap::new(),
        }
    }

    /// Returns the interval covering the whole pipeline run.
    #[must_use]
    pub fn request(&self) -> &Arc<Timing> {
        &self.request
    }

    /// Returns the named interval, creating it if needed.
    #[must_use]
    pub fn get(&self, name: &str) -> Arc<Timing> {
        if name == REQUEST_TIMING {
            return self.request.clone();
        }
        self.named
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Timing::new(name)))
            .clone()
    }

    /// Returns true if the named interval exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        name == REQUEST_TIMING || self.named.contains_key(name)
    }

    /// Returns true if only the request interval exists and it is untouched.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.named.is_empty() && !self.request.is_started()
    }

    /// Ends every interval still running. Returns the names that were ended.
    pub fn end_all_running(&self) -> Vec<String> {
        let mut ended = Vec::new();
        for entry in &self.named {
            if entry.value().is_running() && entry.value().end() {
                ended.push(entry.key().clone());
            }
        }
        if self.request.is_running() && self.request.end() {
            ended.push(REQUEST_TIMING.to_string());
        }
        ended
    }

    /// Takes snapshots of every interval, request first then by name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TimingSnapshot> {
        let mut named: Vec<TimingSnapshot> =
            self.named.iter().map(|entry| entry.value().snapshot()).collect();
        named.sort_by(|a, b| a.name.cmp(&b.name));

        let mut all = Vec::with_capacity(named.len() + 1);
        all.push(self.request.snapshot());
        all.extend(named);
        all
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::new()
    }
}
