//! Collaborator interfaces consumed by workflow steps.
//!
//! The engine performs no I/O of its own. Steps read employee data, invoke a
//! language model, persist verdicts, and send notifications exclusively
//! through the traits in this module, so production implementations (SQL,
//! provider SDKs, SMTP) and test fakes are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An employee profile record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    /// Display name.
    pub name: String,
    /// Department the employee belongs to.
    pub department: String,
    /// Job position.
    pub position: String,
    /// Office city.
    pub city: String,
    /// Age in years, when known.
    pub age: Option<u32>,
}

/// The score set produced by one burnout test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurnoutScores {
    /// Emotional exhaustion sub-score.
    pub exhaustion: i32,
    /// Depersonalization sub-score.
    pub depersonalization: i32,
    /// Personal accomplishment sub-score.
    pub accomplishment: i32,
    /// Composite burnout score, when computed upstream.
    pub burnout: Option<f64>,
    /// Mean reaction time from the attention test, in milliseconds.
    pub mean_reaction_time_ms: Option<f64>,
}

/// One historical assessment row, newest rows first in a history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRecord {
    /// When the test was taken (ISO 8601).
    pub recorded_at: String,
    /// The scores recorded for that test.
    pub scores: BurnoutScores,
    /// The model verdict stored with that test, if any.
    pub verdict: Option<u8>,
}

/// Per-metric averages over a subject's full assessment history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreAverages {
    /// Average exhaustion sub-score.
    pub exhaustion: f64,
    /// Average depersonalization sub-score.
    pub depersonalization: f64,
    /// Average accomplishment sub-score.
    pub accomplishment: f64,
    /// Average composite burnout score.
    pub burnout: f64,
    /// Average mean reaction time in milliseconds.
    pub mean_reaction_time_ms: f64,
}

/// Recent assessments plus aggregate averages for one subject.
///
/// `Default` models the no-prior-data case: an empty record list and
/// all-zero averages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentHistory {
    /// Up to N most recent records, newest first.
    pub recent: Vec<AssessmentRecord>,
    /// Averages over the subject's whole history.
    pub averages: ScoreAverages,
}

/// A time entry logged against a project task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Date of the entry (DD.MM.YYYY, as tracked upstream).
    pub date: String,
    /// Hours logged on that date.
    pub hours: u32,
}

/// A task within a project, with logged time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    /// Task title.
    pub name: String,
    /// Workflow status ("In Progress", "Done", ...).
    pub status: String,
    /// Deadline date.
    pub deadline: String,
    /// Time logged against the task.
    pub spent: Vec<TimeEntry>,
}

/// A meeting attended within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingEntry {
    /// Meeting title.
    pub name: String,
    /// Meeting date.
    pub date: String,
    /// Duration in minutes.
    pub minutes: u32,
}

/// Recent work activity on one project, used as model context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectActivity {
    /// Project name.
    pub project_name: String,
    /// Tasks the subject worked on.
    pub tasks: Vec<TaskEntry>,
    /// Meetings the subject attended.
    pub meetings: Vec<MeetingEntry>,
}

/// Errors from the employee data source.
#[derive(Error, Debug)]
pub enum DataSourceError {
    /// Could not reach the data source.
    #[error("data source connection failed: {0}")]
    Connection(String),
    /// The source rejected or failed the query.
    #[error("data source query failed: {0}")]
    Query(String),
}

/// Read access to employee profiles, assessment history, and work activity.
///
/// Absent data is not an error at this boundary: a missing profile is
/// `Ok(None)` and an empty history is `Ok(AssessmentHistory::default())`.
/// An `Err` means the source itself failed and is fatal to the run.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Look up a subject's profile, if one exists.
    async fn fetch_profile(
        &self,
        subject_id: i64,
    ) -> std::result::Result<Option<Profile>, DataSourceError>;

    /// Fetch up to `limit` most recent assessments (newest first) together
    /// with per-metric averages over the subject's full history.
    async fn fetch_recent_assessments(
        &self,
        subject_id: i64,
        limit: usize,
    ) -> std::result::Result<AssessmentHistory, DataSourceError>;

    /// Fetch the subject's recent per-project work activity.
    async fn fetch_recent_activity(
        &self,
        subject_id: i64,
    ) -> std::result::Result<Vec<ProjectActivity>, DataSourceError>;
}

/// Errors from the language-model provider.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The provider request failed (network, auth, quota).
    #[error("model provider request failed: {0}")]
    Provider(String),
    /// The provider returned no content at all.
    #[error("model provider returned an empty response")]
    Empty,
}

/// A raw model completion plus token usage.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// The completion text. Steps parse this into their structured schema.
    pub text: String,
    /// Tokens consumed by the prompt.
    pub prompt_tokens: usize,
    /// Tokens generated in the completion.
    pub completion_tokens: usize,
}

/// A language-model client producing completions for structured inference.
///
/// Schema conformance is the caller's concern: steps parse [`ModelOutput::text`]
/// and treat a mismatch as a fatal parse failure.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce a completion for the given prompt.
    async fn complete(&self, prompt: &str) -> std::result::Result<ModelOutput, ModelError>;
}

/// Errors from the persistence sink.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not reach the store.
    #[error("store connection failed: {0}")]
    Connection(String),
    /// The write itself failed.
    #[error("store write failed: {0}")]
    Write(String),
}

/// Write access for completed assessments.
#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Record one assessment outcome for a subject.
    async fn record_assessment(
        &self,
        subject_id: i64,
        scores: &BurnoutScores,
        verdict: u8,
    ) -> std::result::Result<(), StoreError>;
}

/// Errors from the notification channel.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Could not reach the delivery service.
    #[error("delivery connection failed: {0}")]
    Connection(String),
    /// The service refused the message.
    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// An outbound notification channel (e-mail in production).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message to the given address.
    async fn send(
        &self,
        address: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), DeliveryError>;
}
