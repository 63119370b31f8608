//! Run context shared between the executor and steps.
//!
//! The context carries the metrics accumulator, the structured trace log,
//! and the cancellation signal for a run. It is cheap to clone and
//! thread-safe, so one context may be shared across several runs when a
//! caller wants aggregated metrics.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::events::{FlowEvent, TraceEntry};
use crate::metrics::RunMetrics;

/// Context passed to every step of a run.
///
/// # Example
///
/// ```rust
/// use burnout_workflow::{FlowEvent, RunContext};
///
/// let ctx = RunContext::new();
/// ctx.emit(FlowEvent::StepStart { step: "gather".to_string() });
/// ctx.record_tokens(120, 40);
///
/// let metrics = ctx.snapshot();
/// assert_eq!(metrics.total_token_count, 160);
/// assert_eq!(ctx.trace_snapshot().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Shared metrics accumulator.
    pub metrics: Arc<Mutex<RunMetrics>>,
    /// Shared trace log of structured run events.
    pub traces: Arc<Mutex<Vec<TraceEntry>>>,
    cancel: CancellationToken,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// Create a context with empty metrics, empty traces, and a cancellation
    /// token nobody holds (the run can only finish on its own).
    #[must_use]
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Create a context driven by a caller-held cancellation token.
    ///
    /// Cancelling the token aborts the run before the next step executes;
    /// collaborators may also observe it to abandon in-flight I/O.
    #[must_use]
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            metrics: Arc::new(Mutex::new(RunMetrics::default())),
            traces: Arc::new(Mutex::new(Vec::new())),
            cancel,
        }
    }

    /// The cancellation token for this context.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record token usage from one model call.
    pub fn record_tokens(&self, prompt: usize, completion: usize) {
        let mut m = self.metrics.lock().unwrap();
        m.add_tokens(prompt, completion);
    }

    /// Increment the completed-steps counter.
    pub fn record_step(&self) {
        let mut m = self.metrics.lock().unwrap();
        m.record_step();
    }

    /// Increment the resolved-routes counter.
    pub fn record_route(&self) {
        let mut m = self.metrics.lock().unwrap();
        m.record_route();
    }

    /// Record a run-fatal failure message.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut m = self.metrics.lock().unwrap();
        m.record_failure(error.into());
    }

    /// Record a swallowed collaborator failure and emit its trace event.
    pub fn record_collaborator_failure(&self, step: &str, message: impl Into<String>) {
        let message = message.into();
        {
            let mut m = self.metrics.lock().unwrap();
            m.record_warning(message.clone());
        }
        self.emit(FlowEvent::CollaboratorFailure {
            step: step.to_string(),
            message,
        });
    }

    /// Get a snapshot of the current metrics.
    #[must_use]
    pub fn snapshot(&self) -> RunMetrics {
        self.metrics.lock().unwrap().clone()
    }

    /// Emit a structured run event to the trace log.
    ///
    /// Events are timestamped when emitted.
    pub fn emit(&self, event: FlowEvent) {
        let entry = TraceEntry::new(event);
        self.traces.lock().unwrap().push(entry);
    }

    /// Get a snapshot of the current trace log.
    #[must_use]
    pub fn trace_snapshot(&self) -> Vec<TraceEntry> {
        self.traces.lock().unwrap().clone()
    }

    /// Clear all trace entries, e.g. between runs sharing one context.
    pub fn clear_traces(&self) {
        self.traces.lock().unwrap().clear();
    }
}
