//! Batch execution over a roster of independent subjects.
//!
//! The batch runner starts one isolated run per subject and aggregates
//! outcomes: one run's failure never stops the rest, and the final report
//! carries exactly one entry per input subject, in input order.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::RunContext;
use crate::error::Error;
use crate::executor::Executor;
use crate::state::FlowState;

/// One roster entry fed to the batch runner.
///
/// Opaque to the engine beyond its identifier and optional contact address;
/// the seed closure turns it into a workflow's initial state.
#[derive(Debug, Clone)]
pub struct Subject {
    /// Stable subject identifier.
    pub id: i64,
    /// Contact address (e-mail), when known.
    pub contact: Option<String>,
}

impl Subject {
    /// Create a subject with a contact address.
    pub fn new(id: i64, contact: impl Into<String>) -> Self {
        Self {
            id,
            contact: Some(contact.into()),
        }
    }

    /// Create a subject without a contact address.
    pub fn without_contact(id: i64) -> Self {
        Self { id, contact: None }
    }
}

/// A failed (or skipped) subject in a batch report.
#[derive(Debug)]
pub struct BatchFailure {
    /// The subject that failed.
    pub subject_id: i64,
    /// Why its run failed, or why no run was started.
    pub error: Error,
}

/// Aggregated outcome of one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Number of subjects whose run reached the terminal sentinel.
    pub succeeded: usize,
    /// Subjects that failed or were skipped, in input order.
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    /// Total subjects accounted for.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    /// Whether every subject succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs a workflow once per subject with per-subject failure isolation.
///
/// By default runs execute strictly one after another. Since distinct runs
/// share no mutable state, [`with_concurrency`](Self::with_concurrency)
/// allows a bounded number of them in flight at once; the report still
/// holds exactly one outcome per subject, in input order.
pub struct BatchRunner<S, F>
where
    S: FlowState,
    F: Fn(&Subject) -> S + Send + Sync,
{
    executor: Executor<S>,
    seed: F,
    require_contact: bool,
    concurrency: usize,
    cancel: Option<CancellationToken>,
}

impl<S, F> BatchRunner<S, F>
where
    S: FlowState,
    F: Fn(&Subject) -> S + Send + Sync,
{
    /// Create a batch runner seeding each run's state with `seed`.
    pub fn new(executor: Executor<S>, seed: F) -> Self {
        Self {
            executor,
            seed,
            require_contact: false,
            concurrency: 1,
            cancel: None,
        }
    }

    /// Skip subjects without a contact address, recording them as failed
    /// without starting a run.
    pub fn require_contact(mut self) -> Self {
        self.require_contact = true;
        self
    }

    /// Allow up to `limit` runs in flight at once (minimum 1).
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Abort remaining runs when this token is cancelled.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Process every subject, in order, and return the aggregated report.
    ///
    /// No error escapes this method: every subject's outcome, including
    /// skips and run failures, is recorded in the report.
    pub async fn run_batch(&self, subjects: &[Subject]) -> BatchReport {
        info!(count = subjects.len(), "batch started");

        let outcomes: Vec<(i64, Option<Error>)> = stream::iter(subjects)
            .map(|subject| self.run_one(subject))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (subject_id, error) in outcomes {
            match error {
                None => report.succeeded += 1,
                Some(error) => report.failed.push(BatchFailure { subject_id, error }),
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "batch finished"
        );
        report
    }

    async fn run_one(&self, subject: &Subject) -> (i64, Option<Error>) {
        if self.require_contact && subject.contact.is_none() {
            warn!(subject_id = subject.id, "subject has no contact address, skipping");
            return (
                subject.id,
                Some(Error::MissingContact {
                    subject_id: subject.id,
                }),
            );
        }

        let ctx = match &self.cancel {
            Some(token) => RunContext::with_cancellation(token.clone()),
            None => RunContext::new(),
        };
        let seed = (self.seed)(subject);

        info!(subject_id = subject.id, "subject run started");
        let outcome = self.executor.run_with_ctx(&ctx, seed).await;
        match &outcome.error {
            None => info!(subject_id = subject.id, "subject run finished"),
            Some(error) => {
                warn!(subject_id = subject.id, error = %error, "subject run failed");
            }
        }
        (subject.id, outcome.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnStep, Graph};

    #[derive(Debug, Clone, Default)]
    struct SubjectState {
        subject_id: i64,
        done: Option<bool>,
    }

    #[derive(Debug, Default)]
    struct SubjectUpdate {
        done: Option<bool>,
    }

    impl FlowState for SubjectState {
        type Update = SubjectUpdate;
        fn apply(&mut self, update: SubjectUpdate) {
            if let Some(done) = update.done {
                self.done = Some(done);
            }
        }
    }

    fn failing_for(bad_id: i64) -> Executor<SubjectState> {
        let graph = Graph::builder("work")
            .step(
                "work",
                FnStep::new(move |state: SubjectState| async move {
                    if state.subject_id == bad_id {
                        Err(Error::Parse("not json".to_string()))
                    } else {
                        Ok(SubjectUpdate { done: Some(true) })
                    }
                }),
            )
            .end_edge("work")
            .build()
            .unwrap();
        Executor::new(graph)
    }

    fn seed(subject: &Subject) -> SubjectState {
        SubjectState {
            subject_id: subject.id,
            done: None,
        }
    }

    #[tokio::test]
    async fn one_failure_never_aborts_the_batch() {
        let runner = BatchRunner::new(failing_for(2), seed);
        let subjects = vec![
            Subject::new(1, "a@example.com"),
            Subject::new(2, "b@example.com"),
            Subject::new(3, "c@example.com"),
        ];

        let report = runner.run_batch(&subjects).await;
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].subject_id, 2);
        assert!(report.failed[0].error.is_parse());
    }

    #[tokio::test]
    async fn missing_contact_is_skipped_without_a_run() {
        // Failing step would reject id 7 if a run were ever started for it.
        let runner = BatchRunner::new(failing_for(7), seed).require_contact();
        let subjects = vec![Subject::new(1, "a@example.com"), Subject::without_contact(7)];

        let report = runner.run_batch(&subjects).await;
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            report.failed[0].error,
            Error::MissingContact { subject_id: 7 }
        ));
    }

    #[tokio::test]
    async fn concurrent_batch_reports_one_outcome_per_subject() {
        let runner = BatchRunner::new(failing_for(4), seed).with_concurrency(4);
        let subjects: Vec<Subject> = (1..=8)
            .map(|id| Subject::new(id, format!("u{id}@example.com")))
            .collect();

        let report = runner.run_batch(&subjects).await;
        assert_eq!(report.total(), 8);
        assert_eq!(report.succeeded, 7);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].subject_id, 4);
    }

    #[tokio::test]
    async fn cancelled_batch_records_cancelled_outcomes() {
        let token = CancellationToken::new();
        token.cancel();
        let runner = BatchRunner::new(failing_for(0), seed).with_cancellation(token);
        let subjects = vec![Subject::new(1, "a@example.com")];

        let report = runner.run_batch(&subjects).await;
        assert_eq!(report.succeeded, 0);
        assert!(report.failed[0].error.is_cancelled());
    }
}
