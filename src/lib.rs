//! # burnout-workflow
//!
//! Graph-based async workflow engine for employee burnout assessment
//! pipelines in Rust.
//!
//! The engine executes a directed graph of named steps against an
//! accumulating, typed state: each step returns a partial update, the
//! executor merges it, and an unconditional or conditional edge decides
//! what runs next. Batch execution isolates
//! per-subject failures so one bad run never aborts a roster sweep.
//!
//! ## Core Concepts
//!
//! - **FlowState**: the typed state threaded through a run, merged from
//!   per-step partial updates
//! - **Step**: a named unit of work, possibly calling external collaborators
//! - **Graph** / **GraphBuilder**: an immutable step/edge definition,
//!   validated at construction
//! - **Router**: the decision function behind a conditional edge
//! - **Executor**: drives one run sequentially to the terminal sentinel
//! - **BatchRunner**: one isolated run per subject, aggregated into a report
//! - **RunContext**: shared metrics, structured trace events, cancellation
//! - **Collaborators**: data source, language model, persistence sink and
//!   notifier traits implemented outside the engine
//!
//! ## Example: a conditional two-step flow
//!
//! ```rust
//! use burnout_workflow::{Executor, FlowState, FnRouter, FnStep, Graph, Next};
//!
//! #[derive(Debug, Clone, Default)]
//! struct TriageState {
//!     score: i32,
//!     escalated: Option<bool>,
//! }
//!
//! #[derive(Debug, Default)]
//! struct TriageUpdate {
//!     escalated: Option<bool>,
//! }
//!
//! impl FlowState for TriageState {
//!     type Update = TriageUpdate;
//!     fn apply(&mut self, update: TriageUpdate) {
//!         if let Some(escalated) = update.escalated {
//!             self.escalated = Some(escalated);
//!         }
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let graph = Graph::builder("triage")
//!     .step("triage", FnStep::new(|_: TriageState| async move {
//!         Ok(TriageUpdate { escalated: None })
//!     }))
//!     .step("escalate", FnStep::new(|_: TriageState| async move {
//!         Ok(TriageUpdate { escalated: Some(true) })
//!     }))
//!     .branch(
//!         "triage",
//!         FnRouter::new(["escalate", "skip"], |s: &TriageState| {
//!             if s.score > 50 { "escalate" } else { "skip" }
//!         }),
//!         [("escalate", Next::step("escalate")), ("skip", Next::End)],
//!     )
//!     .end_edge("escalate")
//!     .build()
//!     .unwrap();
//!
//! let executor = Executor::new(graph).with_name("triage");
//! let seed = TriageState { score: 80, escalated: None };
//! let (outcome, metrics) = executor.run(seed).await;
//!
//! assert!(outcome.is_ok());
//! assert_eq!(outcome.state.escalated, Some(true));
//! assert_eq!(metrics.steps_completed, 2);
//! # });
//! ```

pub mod batch;
pub mod collaborator;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod executor;
pub mod flows;
pub mod graph;
pub mod metrics;
pub mod state;
pub mod step;

pub use batch::{BatchFailure, BatchReport, BatchRunner, Subject};
pub use collaborator::{AssessmentStore, BurnoutScores, DataSource, LanguageModel, Notifier};
pub use context::RunContext;
pub use error::{DefinitionError, Error, Result};
pub use events::{FlowEvent, TraceEntry};
pub use executor::{Executor, RunOutcome};
pub use graph::{Graph, GraphBuilder, Next};
pub use metrics::RunMetrics;
pub use state::FlowState;
pub use step::{FnRouter, FnStep, Router, Step};
