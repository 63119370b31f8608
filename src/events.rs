//! Structured run events for tracing and observability.
//!
//! The executor records one event stream per run context: step boundaries,
//! routing decisions, and swallowed collaborator failures. The stream is
//! typed and serializable, so callers can export or assert on it instead of
//! scraping log lines.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Events emitted while a run executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum FlowEvent {
    /// A step is about to execute.
    StepStart {
        /// Graph name of the step.
        step: String,
    },
    /// A step finished and its update was merged.
    StepEnd {
        /// Graph name of the step.
        step: String,
        /// Execution duration in milliseconds.
        duration_ms: u128,
    },
    /// A conditional edge resolved to a label.
    RouteChosen {
        /// The step carrying the conditional edge.
        step: String,
        /// The label the router returned.
        label: String,
    },
    /// A persistence or notification call failed and was swallowed.
    CollaboratorFailure {
        /// The step that made the call.
        step: String,
        /// The collaborator's error message.
        message: String,
    },
    /// A step failed, aborting the run.
    StepFailed {
        /// The step that failed.
        step: String,
        /// The error message.
        message: String,
    },
    /// The run was aborted by a cancellation signal.
    Cancelled {
        /// The step that was about to execute.
        step: String,
    },
}

/// A timestamped trace entry containing a run event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Unix epoch timestamp in milliseconds when this event occurred.
    pub timestamp: u128,
    /// The recorded event.
    #[serde(flatten)]
    pub event: FlowEvent,
}

impl TraceEntry {
    /// Create a new trace entry stamped with the current time.
    #[must_use]
    pub fn new(event: FlowEvent) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis();
        Self { timestamp, event }
    }
}
