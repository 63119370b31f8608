//! Error types for graph construction and workflow execution.

use thiserror::Error;

use crate::collaborator::{DataSourceError, ModelError};

/// Errors detected while building a [`Graph`](crate::Graph).
///
/// These are programming errors in the workflow definition. They are raised
/// by [`GraphBuilder::build`](crate::GraphBuilder::build) and can never occur
/// once a graph has been constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// The entry step is not among the declared steps.
    #[error("entry step '{0}' is not declared")]
    UnknownEntry(String),

    /// The same step name was declared more than once.
    #[error("step '{0}' is declared more than once")]
    DuplicateStep(String),

    /// An edge references a step that was never declared.
    #[error("edge references undeclared step '{0}'")]
    UndeclaredStep(String),

    /// A step has more than one outgoing edge family.
    #[error("step '{0}' has conflicting outgoing edges")]
    ConflictingEdges(String),

    /// A non-terminal step has no outgoing edge at all.
    #[error("step '{0}' has no outgoing edge")]
    MissingEdge(String),

    /// A routing function can return a label its edge table does not map.
    #[error("branch at step '{step}' does not map label '{label}'")]
    UnmappedLabel {
        /// The step carrying the conditional edge.
        step: String,
        /// The label missing from the edge table.
        label: String,
    },

    /// The edge relation contains a cycle, so a run could revisit a step.
    #[error("edges form a cycle through step '{0}'")]
    Cycle(String),
}

/// The main error type for workflow runs.
#[derive(Error, Debug)]
pub enum Error {
    /// A step's own computation failed, aborting the run.
    #[error("step '{step}' failed: {source}")]
    Step {
        /// Name of the step that failed.
        step: String,
        /// The underlying cause.
        source: Box<Error>,
    },

    /// Model output did not conform to the expected structured schema.
    #[error("model output did not match the expected schema: {0}")]
    Parse(String),

    /// The run was aborted by an external cancellation signal.
    #[error("run cancelled at step '{step}'")]
    Cancelled {
        /// The step that was about to execute when cancellation was observed.
        step: String,
    },

    /// A subject had no contact address, so no run was started for it.
    #[error("subject {subject_id} has no contact address")]
    MissingContact {
        /// The subject that was skipped.
        subject_id: i64,
    },

    /// A step required a state field that no earlier step produced.
    #[error("required state field '{0}' has not been produced")]
    MissingField(&'static str),

    /// A routing function returned a label outside its declared set.
    ///
    /// Unreachable for graphs whose routers honour
    /// [`Router::labels`](crate::Router::labels) (checked at construction);
    /// kept so a misbehaving router fails the run instead of panicking.
    #[error("step '{step}' routed to unknown label '{label}'")]
    UnknownLabel {
        /// The step carrying the conditional edge.
        step: String,
        /// The label the router actually returned.
        label: String,
    },

    /// The data source failed while a step was reading from it.
    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    /// The language-model provider failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A generic error with a message.
    #[error("{0}")]
    Message(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Message(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Message(msg.to_string())
    }
}

impl Error {
    /// Walk the `Step` wrapping, returning the innermost cause.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error (or its root cause) is a schema parse failure.
    pub fn is_parse(&self) -> bool {
        matches!(self.root_cause(), Error::Parse(_))
    }

    /// Whether the run was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

/// A specialized `Result` type for workflow operations.
pub type Result<T> = std::result::Result<T, Error>;
