//! Per-run workflow state and partial-update merging.
//!
//! Every run owns exactly one state value, created fresh from caller-supplied
//! seed fields and discarded when the run terminates. Steps never mutate the
//! state directly: each returns a partial update that the executor merges
//! after the step succeeds.

/// The accumulating state threaded through a run.
///
/// Workflows define a concrete state struct with typed fields rather than an
/// untyped key/value map, so a step reading a field nothing has produced is
/// a visible `Option` at the call site instead of a runtime lookup miss.
/// Fields produced mid-run are `Option<T>`; seed fields are plain values.
///
/// The companion [`Update`](FlowState::Update) type is the partial update a
/// step returns: typically a mirror struct whose fields are all `Option<T>`,
/// with `apply` overwriting exactly the fields the update carries.
///
/// # Merge contract
///
/// `apply` must be a set-union-with-overwrite: a field absent from the update
/// keeps its prior value, and no field is ever cleared. Under that contract
/// the populated fields of a state grow monotonically across a run.
///
/// # Example
///
/// ```rust
/// use burnout_workflow::FlowState;
///
/// #[derive(Debug, Clone, Default)]
/// struct ReviewState {
///     document_id: u64,
///     summary: Option<String>,
///     approved: Option<bool>,
/// }
///
/// #[derive(Debug, Default)]
/// struct ReviewUpdate {
///     summary: Option<String>,
///     approved: Option<bool>,
/// }
///
/// impl FlowState for ReviewState {
///     type Update = ReviewUpdate;
///
///     fn apply(&mut self, update: ReviewUpdate) {
///         if let Some(summary) = update.summary {
///             self.summary = Some(summary);
///         }
///         if let Some(approved) = update.approved {
///             self.approved = Some(approved);
///         }
///     }
/// }
///
/// let mut state = ReviewState { document_id: 7, ..Default::default() };
/// state.apply(ReviewUpdate { summary: Some("ok".into()), approved: None });
/// assert_eq!(state.summary.as_deref(), Some("ok"));
/// assert_eq!(state.approved, None);
/// ```
pub trait FlowState: Send + Sync + 'static {
    /// The partial update produced by each step of this workflow.
    type Update: Send + 'static;

    /// Merge a step's partial update into the state.
    fn apply(&mut self, update: Self::Update);
}
