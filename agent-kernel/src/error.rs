use agent_adapters::GenerationError;
use agent_catalog::CatalogError;
use agent_policy::ReviewError;
use agent_primitives::CredentialName;
use agent_prompts::TemplateError;
use thiserror::Error;

/// Result alias for tool creation.
pub type FactoryResult<T> = Result<T, FactoryError>;

/// Result alias for tool invocation.
pub type InvokeResult<T> = Result<T, InvokeError>;

/// Result alias for agent turns.
pub type TurnResult<T> = Result<T, TurnError>;

/// Failures of `create_tool`.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The request itself is unusable.
    #[error("invalid tool request: {reason}")]
    InvalidRequest {
        /// Human-readable cause.
        reason: String,
    },

    /// Every generation key is exhausted; retry later.
    #[error("generation capacity exhausted: {reason}")]
    Capacity {
        /// Provider message.
        reason: String,
    },

    /// Generation failed for a reason other than capacity.
    #[error("generation failed: {reason}")]
    Generation {
        /// Provider message.
        reason: String,
    },

    /// Every attempt was rejected by the safety review.
    #[error("tool rejected by safety review: {}", reasons.join("; "))]
    SafetyRejected {
        /// Reasons from the last review.
        reasons: Vec<String>,
    },

    /// The generated code needs credentials nothing can supply.
    #[error("missing credentials: {}", join_names(names))]
    MissingCredentials {
        /// Unsatisfied names in declaration order.
        names: Vec<CredentialName>,
    },

    /// Storage failed; nothing was catalogued.
    #[error("tool could not be persisted: {0}")]
    Persistence(#[from] CatalogError),
}

impl FactoryError {
    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Returns true when the caller may retry the same request later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Capacity { .. })
    }
}

impl From<GenerationError> for FactoryError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Capacity { reason } => Self::Capacity { reason },
            GenerationError::Generation { reason } => Self::Generation { reason },
        }
    }
}

impl From<TemplateError> for FactoryError {
    fn from(err: TemplateError) -> Self {
        Self::Generation {
            reason: err.to_string(),
        }
    }
}

impl From<ReviewError> for FactoryError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::Generation(err) => err.into(),
            ReviewError::Prompt(err) => err.into(),
        }
    }
}

/// Failures of `invoke_tool`.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No catalogued tool matches the identifier.
    #[error("tool `{name}` is not available")]
    UnknownTool {
        /// Requested identifier.
        name: String,
    },

    /// The agent context does not exist.
    #[error("agent `{id}` does not exist")]
    UnknownAgent {
        /// Requested agent identifier.
        id: String,
    },

    /// Declared credentials have no value; the tool did not run.
    #[error("Please add your [{}] in settings", join_names(names))]
    MissingCredential {
        /// Unsatisfied names in declaration order.
        names: Vec<CredentialName>,
    },

    /// The tool ran and failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable cause.
        reason: String,
    },
}

/// Failures of an agent turn.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The model could not be reached.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Prompt rendering failed.
    #[error("turn prompt could not be rendered: {0}")]
    Prompt(#[from] TemplateError),
}

pub(crate) fn join_names(names: &[CredentialName]) -> String {
    names
        .iter()
        .map(CredentialName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
