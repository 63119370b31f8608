//! Immutable workflow graph definitions.
//!
//! A [`Graph`] names its steps, fixes the entry point, and wires each step to
//! its successor: either one unconditional edge, a direct edge to the
//! terminal sentinel, or one conditional dispatch through a routing function
//! and label table. All structural rules are enforced by
//! [`GraphBuilder::build`], so a constructed graph can be executed without
//! further validation and shared across unlimited concurrent runs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DefinitionError;
use crate::state::FlowState;
use crate::step::{Router, Step};

/// Where control transfers after a step completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Continue with the named step.
    Step(String),
    /// Terminate the run successfully.
    End,
}

impl Next {
    /// Convenience constructor for [`Next::Step`].
    pub fn step(name: impl Into<String>) -> Self {
        Next::Step(name.into())
    }
}

/// The outgoing edge family of one step.
pub(crate) enum Edge<S> {
    /// Unconditional transfer to another step.
    To(String),
    /// Direct transfer to the terminal sentinel.
    End,
    /// Conditional dispatch: the router picks a label, the table maps it.
    Branch {
        router: Box<dyn Router<S>>,
        table: HashMap<String, Next>,
    },
}

impl<S> Edge<S> {
    /// Step names this edge can transfer to.
    fn successors(&self) -> Vec<&str> {
        match self {
            Edge::To(next) => vec![next.as_str()],
            Edge::End => Vec::new(),
            Edge::Branch { table, .. } => table
                .values()
                .filter_map(|next| match next {
                    Next::Step(name) => Some(name.as_str()),
                    Next::End => None,
                })
                .collect(),
        }
    }
}

/// An immutable, validated workflow definition.
///
/// Holds no per-run state: the same graph (behind an [`Arc`]) drives any
/// number of concurrent runs. Build one with [`Graph::builder`].
pub struct Graph<S: FlowState> {
    entry: String,
    steps: HashMap<String, Box<dyn Step<S>>>,
    edges: HashMap<String, Edge<S>>,
}

impl<S: FlowState> std::fmt::Debug for Graph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("entry", &self.entry)
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .field("edges", &self.edges.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<S: FlowState> Graph<S> {
    /// Start building a graph whose run begins at `entry`.
    pub fn builder(entry: impl Into<String>) -> GraphBuilder<S> {
        GraphBuilder::new(entry)
    }

    /// The entry step name.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Number of declared steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the graph declares no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn step(&self, name: &str) -> Option<&dyn Step<S>> {
        self.steps.get(name).map(|step| step.as_ref())
    }

    pub(crate) fn edge(&self, name: &str) -> Option<&Edge<S>> {
        self.edges.get(name)
    }
}

enum EdgeDecl<S> {
    To(String),
    End,
    Branch {
        router: Box<dyn Router<S>>,
        table: Vec<(String, Next)>,
    },
}

/// Builder collecting steps and edges, validated as a whole by [`build`].
///
/// [`build`]: GraphBuilder::build
///
/// # Example
///
/// ```rust
/// use burnout_workflow::{FlowState, FnStep, Graph};
///
/// #[derive(Debug, Clone, Default)]
/// struct S;
/// impl FlowState for S {
///     type Update = ();
///     fn apply(&mut self, _: ()) {}
/// }
///
/// let graph: Graph<S> = Graph::builder("first")
///     .step("first", FnStep::new(|_: S| async move { Ok(()) }))
///     .step("second", FnStep::new(|_: S| async move { Ok(()) }))
///     .edge("first", "second")
///     .end_edge("second")
///     .build()
///     .unwrap();
/// assert_eq!(graph.entry(), "first");
/// ```
pub struct GraphBuilder<S: FlowState> {
    entry: String,
    steps: Vec<(String, Box<dyn Step<S>>)>,
    edges: Vec<(String, EdgeDecl<S>)>,
}

impl<S: FlowState> GraphBuilder<S> {
    /// Start a builder whose run begins at `entry`.
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            steps: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Declare a named step.
    pub fn step(mut self, name: impl Into<String>, step: impl Step<S> + 'static) -> Self {
        self.steps.push((name.into(), Box::new(step)));
        self
    }

    /// Declare an unconditional edge from `from` to `to`.
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), EdgeDecl::To(to.into())));
        self
    }

    /// Declare that the run terminates after `from` completes.
    pub fn end_edge(mut self, from: impl Into<String>) -> Self {
        self.edges.push((from.into(), EdgeDecl::End));
        self
    }

    /// Declare a conditional dispatch after `from`.
    ///
    /// After `from`'s update is merged, `router` inspects the state and
    /// returns a label; `table` maps each label to the next step or to
    /// [`Next::End`]. Every label the router declares must be mapped.
    pub fn branch<I, L>(
        mut self,
        from: impl Into<String>,
        router: impl Router<S> + 'static,
        table: I,
    ) -> Self
    where
        I: IntoIterator<Item = (L, Next)>,
        L: Into<String>,
    {
        self.edges.push((
            from.into(),
            EdgeDecl::Branch {
                router: Box::new(router),
                table: table
                    .into_iter()
                    .map(|(label, next)| (label.into(), next))
                    .collect(),
            },
        ));
        self
    }

    /// Validate the collected definition and produce an immutable [`Graph`].
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] when the definition is malformed; see
    /// the variants for the full rule set. A graph that builds successfully
    /// can never fail structurally at run time.
    pub fn build(self) -> Result<Graph<S>, DefinitionError> {
        let mut steps: HashMap<String, Box<dyn Step<S>>> = HashMap::new();
        for (name, step) in self.steps {
            if steps.insert(name.clone(), step).is_some() {
                return Err(DefinitionError::DuplicateStep(name));
            }
        }

        if !steps.contains_key(&self.entry) {
            return Err(DefinitionError::UnknownEntry(self.entry));
        }

        let mut edges: HashMap<String, Edge<S>> = HashMap::new();
        for (from, decl) in self.edges {
            if !steps.contains_key(&from) {
                return Err(DefinitionError::UndeclaredStep(from));
            }
            if edges.contains_key(&from) {
                return Err(DefinitionError::ConflictingEdges(from));
            }
            let edge = match decl {
                EdgeDecl::To(to) => {
                    if !steps.contains_key(&to) {
                        return Err(DefinitionError::UndeclaredStep(to));
                    }
                    Edge::To(to)
                }
                EdgeDecl::End => Edge::End,
                EdgeDecl::Branch { router, table } => {
                    let table: HashMap<String, Next> = table.into_iter().collect();
                    for next in table.values() {
                        if let Next::Step(target) = next {
                            if !steps.contains_key(target) {
                                return Err(DefinitionError::UndeclaredStep(target.clone()));
                            }
                        }
                    }
                    for label in router.labels() {
                        if !table.contains_key(&label) {
                            return Err(DefinitionError::UnmappedLabel {
                                step: from.clone(),
                                label,
                            });
                        }
                    }
                    Edge::Branch { router, table }
                }
            };
            edges.insert(from, edge);
        }

        for name in steps.keys() {
            if !edges.contains_key(name) {
                return Err(DefinitionError::MissingEdge(name.clone()));
            }
        }

        detect_cycle(&edges)?;

        Ok(Graph {
            entry: self.entry,
            steps,
            edges,
        })
    }
}

/// Depth-first cycle check over the edge relation.
///
/// A cycle would let a run revisit a step, breaking the at-most-`|steps|`
/// executions guarantee, so it is rejected at construction.
fn detect_cycle<S>(edges: &HashMap<String, Edge<S>>) -> Result<(), DefinitionError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    for start in edges.keys() {
        if marks.contains_key(start.as_str()) {
            continue;
        }
        // Iterative DFS; each frame holds (node, successors, next index).
        let mut stack: Vec<(&str, Vec<&str>, usize)> = Vec::new();
        marks.insert(start.as_str(), Mark::InProgress);
        stack.push((start.as_str(), edges[start.as_str()].successors(), 0));

        loop {
            let pending = {
                let Some(frame) = stack.last_mut() else { break };
                if let Some(&next) = frame.1.get(frame.2) {
                    frame.2 += 1;
                    Some(next)
                } else {
                    marks.insert(frame.0, Mark::Done);
                    None
                }
            };
            match pending {
                Some(next) => match marks.get(next) {
                    Some(Mark::InProgress) => {
                        return Err(DefinitionError::Cycle(next.to_string()));
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(next, Mark::InProgress);
                        let successors = edges
                            .get(next)
                            .map(|edge| edge.successors())
                            .unwrap_or_default();
                        stack.push((next, successors, 0));
                    }
                },
                None => {
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnRouter, FnStep, Step};

    #[derive(Debug, Clone, Default)]
    struct TestState {
        flag: bool,
    }

    #[derive(Debug, Default)]
    struct TestUpdate;

    impl FlowState for TestState {
        type Update = TestUpdate;
        fn apply(&mut self, _: TestUpdate) {}
    }

    fn noop() -> impl Step<TestState> + 'static {
        FnStep::new(|_: TestState| async move { Ok(TestUpdate) })
    }

    #[test]
    fn builds_a_linear_graph() {
        let graph = Graph::builder("a")
            .step("a", noop())
            .step("b", noop())
            .edge("a", "b")
            .end_edge("b")
            .build()
            .unwrap();
        assert_eq!(graph.entry(), "a");
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn rejects_unknown_entry() {
        let err = Graph::builder("missing")
            .step("a", noop())
            .end_edge("a")
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::UnknownEntry("missing".to_string()));
    }

    #[test]
    fn rejects_duplicate_step() {
        let err = Graph::builder("a")
            .step("a", noop())
            .step("a", noop())
            .end_edge("a")
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateStep("a".to_string()));
    }

    #[test]
    fn rejects_edge_to_undeclared_step() {
        let err = Graph::builder("a")
            .step("a", noop())
            .edge("a", "ghost")
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::UndeclaredStep("ghost".to_string()));
    }

    #[test]
    fn rejects_edge_from_undeclared_step() {
        let err = Graph::builder("a")
            .step("a", noop())
            .end_edge("a")
            .end_edge("ghost")
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::UndeclaredStep("ghost".to_string()));
    }

    #[test]
    fn rejects_two_edge_families_on_one_step() {
        let err = Graph::builder("a")
            .step("a", noop())
            .step("b", noop())
            .edge("a", "b")
            .end_edge("a")
            .end_edge("b")
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::ConflictingEdges("a".to_string()));
    }

    #[test]
    fn rejects_step_without_outgoing_edge() {
        let err = Graph::builder("a")
            .step("a", noop())
            .step("b", noop())
            .edge("a", "b")
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::MissingEdge("b".to_string()));
    }

    #[test]
    fn rejects_branch_table_missing_a_router_label() {
        let router = FnRouter::new(["yes", "no"], |s: &TestState| {
            if s.flag {
                "yes"
            } else {
                "no"
            }
        });
        let err = Graph::builder("a")
            .step("a", noop())
            .step("b", noop())
            .branch("a", router, [("yes", Next::step("b"))])
            .end_edge("b")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnmappedLabel {
                step: "a".to_string(),
                label: "no".to_string(),
            }
        );
    }

    #[test]
    fn rejects_branch_target_not_declared() {
        let router = FnRouter::new(["yes"], |_: &TestState| "yes");
        let err = Graph::builder("a")
            .step("a", noop())
            .branch("a", router, [("yes", Next::step("ghost"))])
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::UndeclaredStep("ghost".to_string()));
    }

    #[test]
    fn rejects_cycles() {
        let err = Graph::builder("a")
            .step("a", noop())
            .step("b", noop())
            .edge("a", "b")
            .edge("b", "a")
            .build()
            .unwrap_err();
        assert!(matches!(err, DefinitionError::Cycle(_)));
    }

    #[test]
    fn accepts_branch_covering_all_labels() {
        let router = FnRouter::new(["yes", "no"], |s: &TestState| {
            if s.flag {
                "yes"
            } else {
                "no"
            }
        });
        let graph = Graph::builder("a")
            .step("a", noop())
            .step("b", noop())
            .branch("a", router, [("yes", Next::step("b")), ("no", Next::End)])
            .end_edge("b")
            .build()
            .unwrap();
        assert_eq!(graph.len(), 2);
    }
}
