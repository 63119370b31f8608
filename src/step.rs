//! Step and routing-function traits.
//!
//! A step is a named unit of work in a graph: it reads the accumulated state,
//! may call collaborators, and returns a partial update. A router is the
//! decision function behind a conditional edge, choosing the next step label
//! from a closed set after its step's update has been merged.

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

use crate::{context::RunContext, state::FlowState, Result};

/// A unit of work executed at one node of a workflow graph.
///
/// Steps borrow the state read-only; the only way to change state is the
/// returned partial update, which the executor merges after the step
/// succeeds. An `Err` aborts the run and discards the in-flight update.
///
/// Collaborator calls made inside `run` are blocking from the executor's
/// perspective: the next step never starts before this one's merge completes.
#[async_trait]
pub trait Step<S: FlowState>: Send + Sync {
    /// Execute against the accumulated state, returning a partial update.
    async fn run(&self, ctx: &RunContext, state: &S) -> Result<S::Update>;
}

/// A step constructed from an async closure over a snapshot of the state.
///
/// The closure receives a clone of the current state, which keeps it free of
/// borrow lifetimes and makes one-off steps cheap to write in tests and
/// small workflows.
///
/// # Example
///
/// ```rust
/// use burnout_workflow::{FlowState, FnStep};
///
/// #[derive(Debug, Clone, Default)]
/// struct S { word: Option<String> }
/// #[derive(Debug, Default)]
/// struct U { word: Option<String> }
/// impl FlowState for S {
///     type Update = U;
///     fn apply(&mut self, u: U) {
///         if let Some(w) = u.word { self.word = Some(w); }
///     }
/// }
///
/// let step = FnStep::new(|_state: S| async move {
///     Ok(U { word: Some("hello".to_string()) })
/// });
/// # let _ = step;
/// ```
pub struct FnStep<S, F> {
    f: F,
    _state: PhantomData<fn(S)>,
}

impl<S, F, Fut> FnStep<S, F>
where
    S: FlowState + Clone,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S::Update>> + Send + 'static,
{
    /// Create a new step from the given closure.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _state: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, Fut> Step<S> for FnStep<S, F>
where
    S: FlowState + Clone,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<S::Update>> + Send + 'static,
{
    async fn run(&self, _ctx: &RunContext, state: &S) -> Result<S::Update> {
        (self.f)(state.clone()).await
    }
}

/// The routing function behind a conditional edge.
///
/// A router declares its full label set up front so the graph builder can
/// verify the edge table covers every label it may return. At run time the
/// router inspects the post-merge state and picks one of those labels.
pub trait Router<S>: Send + Sync {
    /// Every label this router can return.
    fn labels(&self) -> Vec<String>;

    /// Choose the next label based on the accumulated state.
    fn route(&self, state: &S) -> String;
}

/// A router constructed from a closure plus its declared label set.
///
/// # Example
///
/// ```rust
/// use burnout_workflow::{FnRouter, Router};
///
/// let router = FnRouter::new(["high", "low"], |score: &i32| {
///     if *score > 50 { "high" } else { "low" }
/// });
/// assert_eq!(router.route(&80), "high");
/// assert_eq!(router.labels(), vec!["high", "low"]);
/// ```
pub struct FnRouter<S, F> {
    labels: Vec<String>,
    f: F,
    _state: PhantomData<fn(&S)>,
}

impl<S, F> FnRouter<S, F>
where
    F: Fn(&S) -> &'static str + Send + Sync,
{
    /// Create a router from its declared labels and decision closure.
    ///
    /// The closure must only ever return labels from `labels`; the graph
    /// builder checks the edge table against that declaration.
    pub fn new<I, L>(labels: I, f: F) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            f,
            _state: PhantomData,
        }
    }
}

impl<S, F> Router<S> for FnRouter<S, F>
where
    S: Send + Sync,
    F: Fn(&S) -> &'static str + Send + Sync,
{
    fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn route(&self, state: &S) -> String {
        (self.f)(state).to_string()
    }
}
