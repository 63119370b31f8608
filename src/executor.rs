//! The sequential run loop.
//!
//! An [`Executor`] drives one run of a [`Graph`] at a time: execute the
//! current step, merge its update, resolve the outgoing edge against the
//! post-merge state, repeat until the terminal sentinel. Steps of one run
//! never overlap; distinct runs share nothing but the graph definition.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::context::RunContext;
use crate::error::Error;
use crate::events::FlowEvent;
use crate::graph::{Edge, Graph, Next};
use crate::metrics::RunMetrics;
use crate::state::FlowState;

/// The result of driving one run to termination or failure.
///
/// On failure the state holds everything merged before the failing step;
/// the in-flight update is discarded, never half-applied.
#[derive(Debug)]
pub struct RunOutcome<S> {
    /// The accumulated state.
    pub state: S,
    /// `None` when the terminal sentinel was reached.
    pub error: Option<Error>,
}

impl<S> RunOutcome<S> {
    /// Whether the run reached the terminal sentinel.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives runs of one graph definition.
///
/// The graph is held behind an [`Arc`] and never mutated, so one executor
/// (or clones of it) may serve any number of concurrent runs.
pub struct Executor<S: FlowState> {
    graph: Arc<Graph<S>>,
    name: String,
}

impl<S: FlowState> Clone for Executor<S> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            name: self.name.clone(),
        }
    }
}

impl<S: FlowState> Executor<S> {
    /// Create an executor for the given graph.
    pub fn new(graph: Graph<S>) -> Self {
        Self {
            graph: Arc::new(graph),
            name: "workflow".to_string(),
        }
    }

    /// Set a human-readable name, used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The executor's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The graph this executor drives.
    pub fn graph(&self) -> &Arc<Graph<S>> {
        &self.graph
    }

    /// Run to termination with a fresh context, returning collected metrics.
    pub async fn run(&self, seed: S) -> (RunOutcome<S>, RunMetrics) {
        let ctx = RunContext::new();
        let outcome = self.run_with_ctx(&ctx, seed).await;
        (outcome, ctx.snapshot())
    }

    /// Run to termination using a caller-provided context.
    ///
    /// Use this to share a metrics/trace accumulator across runs, or to
    /// thread a cancellation token in via
    /// [`RunContext::with_cancellation`].
    pub async fn run_with_ctx(&self, ctx: &RunContext, seed: S) -> RunOutcome<S> {
        let mut state = seed;
        let mut current = self.graph.entry().to_string();

        loop {
            if ctx.is_cancelled() {
                info!(workflow = %self.name, step = %current, "run cancelled");
                ctx.emit(FlowEvent::Cancelled {
                    step: current.clone(),
                });
                return RunOutcome {
                    state,
                    error: Some(Error::Cancelled { step: current }),
                };
            }

            let Some(step) = self.graph.step(&current) else {
                // A built graph always resolves its own step names.
                return RunOutcome {
                    state,
                    error: Some(Error::Message(format!(
                        "graph has no step named '{current}'"
                    ))),
                };
            };

            info!(workflow = %self.name, step = %current, "step started");
            ctx.emit(FlowEvent::StepStart {
                step: current.clone(),
            });
            let started = Instant::now();

            let update = match step.run(ctx, &state).await {
                Ok(update) => update,
                Err(cause) => {
                    error!(workflow = %self.name, step = %current, error = %cause, "step failed");
                    ctx.record_failure(cause.to_string());
                    ctx.emit(FlowEvent::StepFailed {
                        step: current.clone(),
                        message: cause.to_string(),
                    });
                    let error = match cause {
                        Error::Cancelled { .. } => Error::Cancelled { step: current },
                        cause => Error::Step {
                            step: current,
                            source: Box::new(cause),
                        },
                    };
                    return RunOutcome {
                        state,
                        error: Some(error),
                    };
                }
            };

            // A cancellation observed while the step was running discards
            // its update: nothing from a cancelled step is merged.
            if ctx.is_cancelled() {
                info!(workflow = %self.name, step = %current, "run cancelled");
                ctx.emit(FlowEvent::Cancelled {
                    step: current.clone(),
                });
                return RunOutcome {
                    state,
                    error: Some(Error::Cancelled { step: current }),
                };
            }

            state.apply(update);
            ctx.record_step();
            ctx.emit(FlowEvent::StepEnd {
                step: current.clone(),
                duration_ms: started.elapsed().as_millis(),
            });

            let next = match self.graph.edge(&current) {
                Some(Edge::End) | None => Next::End,
                Some(Edge::To(next)) => Next::Step(next.clone()),
                Some(Edge::Branch { router, table }) => {
                    let label = router.route(&state);
                    info!(workflow = %self.name, step = %current, label = %label, "route chosen");
                    ctx.record_route();
                    ctx.emit(FlowEvent::RouteChosen {
                        step: current.clone(),
                        label: label.clone(),
                    });
                    match table.get(&label) {
                        Some(next) => next.clone(),
                        None => {
                            return RunOutcome {
                                state,
                                error: Some(Error::UnknownLabel {
                                    step: current,
                                    label,
                                }),
                            };
                        }
                    }
                }
            };

            match next {
                Next::End => {
                    info!(workflow = %self.name, "run finished");
                    return RunOutcome { state, error: None };
                }
                Next::Step(next) => current = next,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnRouter, FnStep, Next, Step};
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone, Default)]
    struct TraceState {
        visited: Vec<String>,
        take_detour: bool,
        payload: Option<String>,
    }

    #[derive(Debug, Default)]
    struct TraceUpdate {
        visit: Option<String>,
        payload: Option<String>,
    }

    impl FlowState for TraceState {
        type Update = TraceUpdate;
        fn apply(&mut self, update: TraceUpdate) {
            if let Some(name) = update.visit {
                self.visited.push(name);
            }
            if let Some(payload) = update.payload {
                self.payload = Some(payload);
            }
        }
    }

    fn visit(name: &'static str) -> impl Step<TraceState> + 'static {
        FnStep::new(move |_: TraceState| async move {
            Ok(TraceUpdate {
                visit: Some(name.to_string()),
                ..Default::default()
            })
        })
    }

    #[tokio::test]
    async fn executes_steps_in_graph_order() {
        let graph = Graph::builder("one")
            .step("one", visit("one"))
            .step("two", visit("two"))
            .step("three", visit("three"))
            .edge("one", "two")
            .edge("two", "three")
            .end_edge("three")
            .build()
            .unwrap();

        let (outcome, metrics) = Executor::new(graph).run(TraceState::default()).await;
        assert!(outcome.is_ok());
        assert_eq!(outcome.state.visited, vec!["one", "two", "three"]);
        assert_eq!(metrics.steps_completed, 3);
    }

    #[tokio::test]
    async fn merge_preserves_earlier_fields() {
        let graph = Graph::builder("write")
            .step(
                "write",
                FnStep::new(|_: TraceState| async move {
                    Ok(TraceUpdate {
                        visit: Some("write".to_string()),
                        payload: Some("first".to_string()),
                    })
                }),
            )
            .step("noop", visit("noop"))
            .edge("write", "noop")
            .end_edge("noop")
            .build()
            .unwrap();

        let (outcome, _) = Executor::new(graph).run(TraceState::default()).await;
        // The second step's update carried no payload, so the first value stays.
        assert_eq!(outcome.state.payload.as_deref(), Some("first"));
        assert_eq!(outcome.state.visited, vec!["write", "noop"]);
    }

    #[tokio::test]
    async fn failing_step_discards_its_update_and_keeps_prior_state() {
        let graph = Graph::builder("ok")
            .step("ok", visit("ok"))
            .step(
                "boom",
                FnStep::new(|_: TraceState| async move {
                    Err::<TraceUpdate, _>(Error::Message("boom".to_string()))
                }),
            )
            .step("after", visit("after"))
            .edge("ok", "boom")
            .edge("boom", "after")
            .end_edge("after")
            .build()
            .unwrap();

        let (outcome, metrics) = Executor::new(graph).run(TraceState::default()).await;
        let error = outcome.error.expect("run should fail");
        assert!(matches!(&error, Error::Step { step, .. } if step == "boom"));
        // State reflects only the merges before the failure.
        assert_eq!(outcome.state.visited, vec!["ok"]);
        assert_eq!(metrics.steps_completed, 1);
        assert!(metrics.has_failures());
    }

    #[tokio::test]
    async fn conditional_edge_follows_the_routed_label() {
        let build = |detour: bool| {
            let router = FnRouter::new(["detour", "skip"], |s: &TraceState| {
                if s.take_detour {
                    "detour"
                } else {
                    "skip"
                }
            });
            let graph = Graph::builder("start")
                .step("start", visit("start"))
                .step("detour", visit("detour"))
                .branch(
                    "start",
                    router,
                    [("detour", Next::step("detour")), ("skip", Next::End)],
                )
                .end_edge("detour")
                .build()
                .unwrap();
            let seed = TraceState {
                take_detour: detour,
                ..Default::default()
            };
            (Executor::new(graph), seed)
        };

        let (executor, seed) = build(true);
        let (outcome, _) = executor.run(seed).await;
        assert_eq!(outcome.state.visited, vec!["start", "detour"]);

        let (executor, seed) = build(false);
        let (outcome, metrics) = executor.run(seed).await;
        assert_eq!(outcome.state.visited, vec!["start"]);
        assert_eq!(metrics.routes_resolved, 1);
    }

    #[tokio::test]
    async fn router_sees_post_merge_state() {
        // The router's decision must be based on the update the routed
        // step just produced, not the seed.
        let router = FnRouter::new(["left", "right"], |s: &TraceState| {
            if s.payload.as_deref() == Some("routed") {
                "left"
            } else {
                "right"
            }
        });
        let graph = Graph::builder("produce")
            .step(
                "produce",
                FnStep::new(|_: TraceState| async move {
                    Ok(TraceUpdate {
                        payload: Some("routed".to_string()),
                        ..Default::default()
                    })
                }),
            )
            .step("left", visit("left"))
            .step("right", visit("right"))
            .branch(
                "produce",
                router,
                [("left", Next::step("left")), ("right", Next::step("right"))],
            )
            .end_edge("left")
            .end_edge("right")
            .build()
            .unwrap();

        let (outcome, _) = Executor::new(graph).run(TraceState::default()).await;
        assert_eq!(outcome.state.visited, vec!["left"]);
    }

    #[tokio::test]
    async fn cancellation_aborts_before_the_next_step() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RunContext::with_cancellation(token);

        let graph = Graph::builder("one")
            .step("one", visit("one"))
            .end_edge("one")
            .build()
            .unwrap();

        let outcome = Executor::new(graph)
            .run_with_ctx(&ctx, TraceState::default())
            .await;
        let error = outcome.error.expect("run should be cancelled");
        assert!(error.is_cancelled());
        // Nothing ran, nothing merged.
        assert!(outcome.state.visited.is_empty());
        assert_eq!(ctx.snapshot().steps_completed, 0);
    }

    #[tokio::test]
    async fn cancellation_during_a_step_discards_its_update() {
        let token = CancellationToken::new();
        let ctx = RunContext::with_cancellation(token.clone());

        let step_token = token.clone();
        let graph = Graph::builder("one")
            .step(
                "one",
                FnStep::new(move |_: TraceState| {
                    let token = step_token.clone();
                    async move {
                        token.cancel();
                        Ok(TraceUpdate {
                            visit: Some("one".to_string()),
                            ..Default::default()
                        })
                    }
                }),
            )
            .end_edge("one")
            .build()
            .unwrap();

        let outcome = Executor::new(graph)
            .run_with_ctx(&ctx, TraceState::default())
            .await;
        assert!(outcome.error.expect("run should be cancelled").is_cancelled());
        // The completed step's update was not merged.
        assert!(outcome.state.visited.is_empty());
    }

    #[tokio::test]
    async fn trace_records_step_boundaries_and_routes() {
        let router = FnRouter::new(["skip"], |_: &TraceState| "skip");
        let graph = Graph::builder("start")
            .step("start", visit("start"))
            .branch("start", router, [("skip", Next::End)])
            .build()
            .unwrap();

        let ctx = RunContext::new();
        let outcome = Executor::new(graph)
            .run_with_ctx(&ctx, TraceState::default())
            .await;
        assert!(outcome.is_ok());

        let kinds: Vec<String> = ctx
            .trace_snapshot()
            .iter()
            .map(|entry| {
                serde_json::to_value(&entry.event).unwrap()["type"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(kinds, vec!["StepStart", "StepEnd", "RouteChosen"]);
    }
}
