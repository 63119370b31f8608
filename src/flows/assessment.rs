//! The per-test assessment workflow.
//!
//! Runs once per submitted burnout test: gather the subject's profile,
//! history, and recent activity; ask the model for a binary burnout verdict
//! with an optional recommendation; persist the outcome. Linear graph, no
//! branching: `gather → infer → persist → end`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::collaborator::{
    AssessmentHistory, AssessmentStore, BurnoutScores, DataSource, LanguageModel, Profile,
    ProjectActivity,
};
use crate::context::RunContext;
use crate::error::{DefinitionError, Error, Result};
use crate::graph::Graph;
use crate::state::FlowState;
use crate::step::Step;

use super::{parse_structured, RECENT_ASSESSMENT_LIMIT};

/// The structured shape the model must return for an assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentVerdict {
    /// Binary burnout verdict: 0 = no burnout, 1 = burnout.
    pub verdict: u8,
    /// Recommendation text for the subject, when the model provides one.
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// State threaded through one assessment run.
#[derive(Debug, Clone)]
pub struct AssessmentState {
    /// The subject being assessed.
    pub subject_id: i64,
    /// The scores from the just-submitted test.
    pub scores: BurnoutScores,
    /// Profile produced by `gather`.
    pub profile: Option<Profile>,
    /// History produced by `gather`.
    pub history: Option<AssessmentHistory>,
    /// Work activity produced by `gather`.
    pub activity: Option<Vec<ProjectActivity>>,
    /// Verdict produced by `infer`.
    pub verdict: Option<AssessmentVerdict>,
}

impl AssessmentState {
    /// Seed a fresh run for one subject and one set of test scores.
    pub fn new(subject_id: i64, scores: BurnoutScores) -> Self {
        Self {
            subject_id,
            scores,
            profile: None,
            history: None,
            activity: None,
            verdict: None,
        }
    }
}

/// Partial update for [`AssessmentState`].
#[derive(Debug, Default)]
pub struct AssessmentUpdate {
    /// Replaces the profile when present.
    pub profile: Option<Profile>,
    /// Replaces the history when present.
    pub history: Option<AssessmentHistory>,
    /// Replaces the activity when present.
    pub activity: Option<Vec<ProjectActivity>>,
    /// Replaces the verdict when present.
    pub verdict: Option<AssessmentVerdict>,
}

impl FlowState for AssessmentState {
    type Update = AssessmentUpdate;

    fn apply(&mut self, update: AssessmentUpdate) {
        if let Some(profile) = update.profile {
            self.profile = Some(profile);
        }
        if let Some(history) = update.history {
            self.history = Some(history);
        }
        if let Some(activity) = update.activity {
            self.activity = Some(activity);
        }
        if let Some(verdict) = update.verdict {
            self.verdict = Some(verdict);
        }
    }
}

/// Reads the subject's context from the data source.
///
/// Absent data is never fatal here: a missing profile becomes defaults and
/// an empty history stays empty. Only a failing source aborts the run.
pub struct GatherStep<D> {
    source: Arc<D>,
}

impl<D: DataSource> GatherStep<D> {
    /// Create the step over the given data source.
    pub fn new(source: Arc<D>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl<D: DataSource + 'static> Step<AssessmentState> for GatherStep<D> {
    async fn run(&self, _ctx: &RunContext, state: &AssessmentState) -> Result<AssessmentUpdate> {
        let profile = match self.source.fetch_profile(state.subject_id).await? {
            Some(profile) => profile,
            None => {
                info!(subject_id = state.subject_id, "no profile on record, using defaults");
                Profile::default()
            }
        };
        let history = self
            .source
            .fetch_recent_assessments(state.subject_id, RECENT_ASSESSMENT_LIMIT)
            .await?;
        let activity = self.source.fetch_recent_activity(state.subject_id).await?;

        Ok(AssessmentUpdate {
            profile: Some(profile),
            history: Some(history),
            activity: Some(activity),
            verdict: None,
        })
    }
}

/// Invokes the model and parses its structured verdict.
///
/// Reads the profile, history, and activity that `gather` produced. A
/// completion that does not parse into [`AssessmentVerdict`] aborts the run.
pub struct InferStep<M> {
    model: Arc<M>,
}

impl<M: LanguageModel> InferStep<M> {
    /// Create the step over the given model client.
    pub fn new(model: Arc<M>) -> Self {
        Self { model }
    }
}

#[derive(Serialize)]
struct PromptContext<'a> {
    profile: &'a Profile,
    test_scores: &'a BurnoutScores,
    recent_assessments: &'a AssessmentHistory,
    work_activity: &'a [ProjectActivity],
}

fn build_prompt(state: &AssessmentState) -> Result<String> {
    let profile = state.profile.as_ref().ok_or(Error::MissingField("profile"))?;
    let history = state.history.as_ref().ok_or(Error::MissingField("history"))?;
    let activity = state
        .activity
        .as_ref()
        .ok_or(Error::MissingField("activity"))?;

    let context = serde_json::to_string_pretty(&PromptContext {
        profile,
        test_scores: &state.scores,
        recent_assessments: history,
        work_activity: activity,
    })?;

    Ok(format!(
        "You assess employee burnout from test scores, prior results and \
         recent work activity.\n\
         Respond with a single JSON object and nothing else:\n\
         {{\"verdict\": 0 or 1, \"recommendation\": string or null}}\n\
         where verdict 1 means the employee shows burnout.\n\n\
         Employee context:\n{context}"
    ))
}

#[async_trait]
impl<M: LanguageModel + 'static> Step<AssessmentState> for InferStep<M> {
    async fn run(&self, ctx: &RunContext, state: &AssessmentState) -> Result<AssessmentUpdate> {
        let prompt = build_prompt(state)?;
        let output = self.model.complete(&prompt).await?;
        ctx.record_tokens(output.prompt_tokens, output.completion_tokens);

        let verdict: AssessmentVerdict = parse_structured(&output.text)?;
        if verdict.verdict > 1 {
            return Err(Error::Parse(format!(
                "verdict must be 0 or 1, got {}",
                verdict.verdict
            )));
        }

        Ok(AssessmentUpdate {
            verdict: Some(verdict),
            ..Default::default()
        })
    }
}

/// Records the verdict in the assessment store.
///
/// A store failure is logged and recorded on the context, then swallowed:
/// the run still completes.
pub struct PersistStep<P> {
    store: Arc<P>,
}

impl<P: AssessmentStore> PersistStep<P> {
    /// Create the step over the given store.
    pub fn new(store: Arc<P>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<P: AssessmentStore + 'static> Step<AssessmentState> for PersistStep<P> {
    async fn run(&self, ctx: &RunContext, state: &AssessmentState) -> Result<AssessmentUpdate> {
        let verdict = state.verdict.as_ref().ok_or(Error::MissingField("verdict"))?;

        if let Err(cause) = self
            .store
            .record_assessment(state.subject_id, &state.scores, verdict.verdict)
            .await
        {
            error!(
                subject_id = state.subject_id,
                error = %cause,
                "failed to record assessment"
            );
            ctx.record_collaborator_failure("persist", cause.to_string());
        }

        Ok(AssessmentUpdate::default())
    }
}

/// Assemble the assessment graph over concrete collaborators.
pub fn assessment_graph<D, M, P>(
    source: Arc<D>,
    model: Arc<M>,
    store: Arc<P>,
) -> std::result::Result<Graph<AssessmentState>, DefinitionError>
where
    D: DataSource + 'static,
    M: LanguageModel + 'static,
    P: AssessmentStore + 'static,
{
    Graph::builder("gather")
        .step("gather", GatherStep::new(source))
        .step("infer", InferStep::new(model))
        .step("persist", PersistStep::new(store))
        .edge("gather", "infer")
        .edge("infer", "persist")
        .end_edge("persist")
        .build()
}
