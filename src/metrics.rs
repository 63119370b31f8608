//! Metrics collection for workflow runs.

use serde::{Deserialize, Serialize};

/// Aggregated metrics for one or more runs sharing a context.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Number of steps that completed and had their update merged.
    pub steps_completed: usize,
    /// Number of conditional edges resolved.
    pub routes_resolved: usize,
    /// Prompt tokens consumed by model calls.
    pub prompt_token_count: usize,
    /// Completion tokens generated by model calls.
    pub completion_token_count: usize,
    /// Total tokens across all model calls.
    pub total_token_count: usize,
    /// Messages from errors that aborted a run.
    pub failures: Vec<String>,
    /// Messages from collaborator failures that were swallowed.
    pub warnings: Vec<String>,
}

impl RunMetrics {
    /// Record prompt and completion token usage from one model call.
    pub fn add_tokens(&mut self, prompt: usize, completion: usize) {
        self.prompt_token_count += prompt;
        self.completion_token_count += completion;
        self.total_token_count += prompt + completion;
    }

    /// Increment the completed-steps counter.
    pub fn record_step(&mut self) {
        self.steps_completed += 1;
    }

    /// Increment the resolved-routes counter.
    pub fn record_route(&mut self) {
        self.routes_resolved += 1;
    }

    /// Record a run-fatal failure message.
    pub fn record_failure(&mut self, error: String) {
        self.failures.push(error);
    }

    /// Record a swallowed collaborator failure.
    pub fn record_warning(&mut self, message: String) {
        self.warnings.push(message);
    }

    /// Whether any run sharing this context failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Total tokens used across all model calls.
    pub fn total_tokens(&self) -> usize {
        self.total_token_count
    }
}
