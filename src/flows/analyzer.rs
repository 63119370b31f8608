//! The roster-wide analyzer workflow.
//!
//! Runs periodically over every known employee: gather context, ask the
//! model for recommendations plus a notify-or-not decision, and e-mail the
//! recommendations only when the model asks for it. The decision is the
//! graph's single conditional edge: `gather → infer → (notify | end)`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::batch::{BatchRunner, Subject};
use crate::collaborator::{
    AssessmentHistory, DataSource, LanguageModel, Notifier, Profile, ProjectActivity,
};
use crate::context::RunContext;
use crate::error::{DefinitionError, Error, Result};
use crate::executor::Executor;
use crate::graph::{Graph, Next};
use crate::state::FlowState;
use crate::step::{FnRouter, Step};

use super::{parse_structured, RECENT_ASSESSMENT_LIMIT};

/// Subject line used for recommendation e-mails.
pub const NOTIFICATION_SUBJECT: &str =
    "Personal recommendations from your latest burnout review";

/// The structured shape the model must return for the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationAdvice {
    /// Recommendation text for the subject.
    pub recommendation: String,
    /// Whether the subject should be notified about it.
    pub notify_required: bool,
}

/// State threaded through one analyzer run.
#[derive(Debug, Clone)]
pub struct AnalyzerState {
    /// The subject being analyzed.
    pub subject_id: i64,
    /// Where to send recommendations. The batch runner guarantees this is
    /// present before a run starts.
    pub contact: Option<String>,
    /// Profile produced by `gather`.
    pub profile: Option<Profile>,
    /// History produced by `gather`.
    pub history: Option<AssessmentHistory>,
    /// Work activity produced by `gather`.
    pub activity: Option<Vec<ProjectActivity>>,
    /// Advice produced by `infer`.
    pub advice: Option<RecommendationAdvice>,
}

impl AnalyzerState {
    /// Seed a fresh run for one subject.
    pub fn new(subject_id: i64, contact: Option<String>) -> Self {
        Self {
            subject_id,
            contact,
            profile: None,
            history: None,
            activity: None,
            advice: None,
        }
    }
}

/// Partial update for [`AnalyzerState`].
#[derive(Debug, Default)]
pub struct AnalyzerUpdate {
    /// Replaces the profile when present.
    pub profile: Option<Profile>,
    /// Replaces the history when present.
    pub history: Option<AssessmentHistory>,
    /// Replaces the activity when present.
    pub activity: Option<Vec<ProjectActivity>>,
    /// Replaces the advice when present.
    pub advice: Option<RecommendationAdvice>,
}

impl FlowState for AnalyzerState {
    type Update = AnalyzerUpdate;

    fn apply(&mut self, update: AnalyzerUpdate) {
        if let Some(profile) = update.profile {
            self.profile = Some(profile);
        }
        if let Some(history) = update.history {
            self.history = Some(history);
        }
        if let Some(activity) = update.activity {
            self.activity = Some(activity);
        }
        if let Some(advice) = update.advice {
            self.advice = Some(advice);
        }
    }
}

/// Reads the subject's context from the data source.
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
impl<D: DataSource + 'static> Step<AnalyzerState> for GatherStep<D> {
    async fn run(&self, _ctx: &RunContext, state: &AnalyzerState) -> Result<AnalyzerUpdate> {
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

        Ok(AnalyzerUpdate {
            profile: Some(profile),
            history: Some(history),
            activity: Some(activity),
            advice: None,
        })
    }
}

/// Invokes the model and parses its recommendation/notify decision.
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
    recent_assessments: &'a AssessmentHistory,
    work_activity: &'a [ProjectActivity],
}

fn build_prompt(state: &AnalyzerState) -> Result<String> {
    let profile = state.profile.as_ref().ok_or(Error::MissingField("profile"))?;
    let history = state.history.as_ref().ok_or(Error::MissingField("history"))?;
    let activity = state
        .activity
        .as_ref()
        .ok_or(Error::MissingField("activity"))?;

    let context = serde_json::to_string_pretty(&PromptContext {
        profile,
        recent_assessments: history,
        work_activity: activity,
    })?;

    Ok(format!(
        "You review an employee's recent burnout history and work activity \
         and write recommendations for their wellbeing.\n\
         Respond with a single JSON object and nothing else:\n\
         {{\"recommendation\": string, \"notify_required\": true or false}}\n\
         where notify_required is true only when the employee should be \
         contacted about the recommendations now.\n\n\
         Employee context:\n{context}"
    ))
}

#[async_trait]
impl<M: LanguageModel + 'static> Step<AnalyzerState> for InferStep<M> {
    async fn run(&self, ctx: &RunContext, state: &AnalyzerState) -> Result<AnalyzerUpdate> {
        let prompt = build_prompt(state)?;
        let output = self.model.complete(&prompt).await?;
        ctx.record_tokens(output.prompt_tokens, output.completion_tokens);

        let advice: RecommendationAdvice = parse_structured(&output.text)?;

        Ok(AnalyzerUpdate {
            advice: Some(advice),
            ..Default::default()
        })
    }
}

/// E-mails the recommendation to the subject.
///
/// Delivery failure is logged and recorded on the context, then swallowed:
/// the run still completes.
pub struct NotifyStep<N> {
    notifier: Arc<N>,
}

impl<N: Notifier> NotifyStep<N> {
    /// Create the step over the given notifier.
    pub fn new(notifier: Arc<N>) -> Self {
        Self { notifier }
    }
}

fn render_notification(profile: Option<&Profile>, recommendation: &str) -> String {
    let greeting = match profile.map(|p| p.name.as_str()) {
        Some(name) if !name.is_empty() => format!("Hello {name}!"),
        _ => "Hello!".to_string(),
    };
    format!(
        "<html><body>\
         <h2>{greeting}</h2>\
         <p>We reviewed your recent tests and work activity.</p>\
         <h3>Recommendations:</h3>\
         <p>{recommendation}</p>\
         <p>Please take care of your wellbeing. If you have questions, reach \
         out to your manager or HR specialist.</p>\
         <p>To help us keep supporting you, please take the next work-state \
         survey when it opens.</p>\
         </body></html>"
    )
}

#[async_trait]
impl<N: Notifier + 'static> Step<AnalyzerState> for NotifyStep<N> {
    async fn run(&self, ctx: &RunContext, state: &AnalyzerState) -> Result<AnalyzerUpdate> {
        let advice = state.advice.as_ref().ok_or(Error::MissingField("advice"))?;
        let address = state.contact.as_ref().ok_or(Error::MissingField("contact"))?;

        let body = render_notification(state.profile.as_ref(), &advice.recommendation);
        match self
            .notifier
            .send(address, NOTIFICATION_SUBJECT, &body)
            .await
        {
            Ok(()) => info!(subject_id = state.subject_id, "recommendation e-mail sent"),
            Err(cause) => {
                error!(
                    subject_id = state.subject_id,
                    error = %cause,
                    "failed to send recommendation e-mail"
                );
                ctx.record_collaborator_failure("notify", cause.to_string());
            }
        }

        Ok(AnalyzerUpdate::default())
    }
}

/// Assemble the analyzer graph over concrete collaborators.
pub fn analyzer_graph<D, M, N>(
    source: Arc<D>,
    model: Arc<M>,
    notifier: Arc<N>,
) -> std::result::Result<Graph<AnalyzerState>, DefinitionError>
where
    D: DataSource + 'static,
    M: LanguageModel + 'static,
    N: Notifier + 'static,
{
    let decide = FnRouter::new(["notify", "skip"], |state: &AnalyzerState| {
        if state.advice.as_ref().is_some_and(|a| a.notify_required) {
            "notify"
        } else {
            "skip"
        }
    });

    Graph::builder("gather")
        .step("gather", GatherStep::new(source))
        .step("infer", InferStep::new(model))
        .step("notify", NotifyStep::new(notifier))
        .edge("gather", "infer")
        .branch(
            "infer",
            decide,
            [("notify", Next::step("notify")), ("skip", Next::End)],
        )
        .end_edge("notify")
        .build()
}

/// Build the roster-wide batch runner for the analyzer workflow.
///
/// Subjects without a contact address are recorded as failed without a run,
/// since the workflow exists to notify.
pub fn analyzer_batch(
    graph: Graph<AnalyzerState>,
) -> BatchRunner<AnalyzerState, impl Fn(&Subject) -> AnalyzerState + Send + Sync> {
    BatchRunner::new(
        Executor::new(graph).with_name("analyzer"),
        |subject: &Subject| AnalyzerState::new(subject.id, subject.contact.clone()),
    )
    .require_contact()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{DataSourceError, DeliveryError, ModelError, ModelOutput};
    use std::sync::Mutex;

    struct FakeSource;

    #[async_trait]
    impl DataSource for FakeSource {
        async fn fetch_profile(
            &self,
            _subject_id: i64,
        ) -> std::result::Result<Option<Profile>, DataSourceError> {
            Ok(Some(Profile {
                name: "B".to_string(),
                department: "R&D".to_string(),
                ..Default::default()
            }))
        }

        async fn fetch_recent_assessments(
            &self,
            _subject_id: i64,
            _limit: usize,
        ) -> std::result::Result<AssessmentHistory, DataSourceError> {
            Ok(AssessmentHistory::default())
        }

        async fn fetch_recent_activity(
            &self,
            _subject_id: i64,
        ) -> std::result::Result<Vec<ProjectActivity>, DataSourceError> {
            Ok(Vec::new())
        }
    }

    struct FakeModel {
        text: String,
    }

    #[async_trait]
    impl LanguageModel for FakeModel {
        async fn complete(
            &self,
            _prompt: &str,
        ) -> std::result::Result<ModelOutput, ModelError> {
            Ok(ModelOutput {
                text: self.text.clone(),
                prompt_tokens: 150,
                completion_tokens: 40,
            })
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        fail: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn send(
            &self,
            address: &str,
            subject: &str,
            _body: &str,
        ) -> std::result::Result<(), DeliveryError> {
            if self.fail {
                return Err(DeliveryError::Rejected("mailbox unavailable".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((address.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn graph_with(
        model_text: &str,
        notifier: Arc<FakeNotifier>,
    ) -> Graph<AnalyzerState> {
        analyzer_graph(
            Arc::new(FakeSource),
            Arc::new(FakeModel {
                text: model_text.to_string(),
            }),
            notifier,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn notify_required_routes_to_the_notifier() {
        let notifier = Arc::new(FakeNotifier::default());
        let graph = graph_with(
            r#"{"recommendation": "Take more breaks.", "notify_required": true}"#,
            Arc::clone(&notifier),
        );

        let seed = AnalyzerState::new(5, Some("b@example.com".to_string()));
        let (outcome, metrics) = Executor::new(graph).run(seed).await;

        assert!(outcome.is_ok());
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "b@example.com");
        assert_eq!(sent[0].1, NOTIFICATION_SUBJECT);
        assert_eq!(metrics.steps_completed, 3);
        assert_eq!(metrics.routes_resolved, 1);
    }

    #[tokio::test]
    async fn notify_not_required_skips_the_notifier() {
        let notifier = Arc::new(FakeNotifier::default());
        let graph = graph_with(
            r#"{"recommendation": "Keep it up.", "notify_required": false}"#,
            Arc::clone(&notifier),
        );

        let seed = AnalyzerState::new(5, Some("b@example.com".to_string()));
        let (outcome, metrics) = Executor::new(graph).run(seed).await;

        assert!(outcome.is_ok());
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert_eq!(metrics.steps_completed, 2);
    }

    #[tokio::test]
    async fn delivery_failure_does_not_abort_the_run() {
        let notifier = Arc::new(FakeNotifier {
            fail: true,
            ..Default::default()
        });
        let graph = graph_with(
            r#"{"recommendation": "Log off on time.", "notify_required": true}"#,
            Arc::clone(&notifier),
        );

        let seed = AnalyzerState::new(5, Some("b@example.com".to_string()));
        let (outcome, metrics) = Executor::new(graph).run(seed).await;

        assert!(outcome.is_ok());
        assert_eq!(metrics.warnings.len(), 1);
    }

    #[tokio::test]
    async fn roster_batch_skips_subjects_without_email() {
        let notifier = Arc::new(FakeNotifier::default());
        let graph = graph_with(
            r#"{"recommendation": "Take more breaks.", "notify_required": true}"#,
            Arc::clone(&notifier),
        );
        let runner = analyzer_batch(graph);

        let roster = vec![
            Subject::new(1, "one@example.com"),
            Subject::without_contact(2),
            Subject::new(3, "three@example.com"),
        ];
        let report = runner.run_batch(&roster).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].subject_id, 2);
        assert_eq!(notifier.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn notification_greets_by_name_when_known() {
        let profile = Profile {
            name: "B".to_string(),
            ..Default::default()
        };
        let body = render_notification(Some(&profile), "Rest more.");
        assert!(body.contains("Hello B!"));
        assert!(body.contains("Rest more."));

        let anonymous = render_notification(None, "Rest more.");
        assert!(anonymous.contains("Hello!"));
    }
}
