use agent_catalog::CatalogError;
use thiserror::Error;

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors produced by tool registration, binding and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool identifier collided with an existing registration.
    #[error("tool `{name}` is already registered")]
    DuplicateTool {
        /// Identifier of the offending tool.
        name: String,
    },

    /// Requested tool does not exist.
    #[error("tool `{name}` is not registered")]
    UnknownTool {
        /// Identifier of the missing tool.
        name: String,
    },

    /// The artifact could not be turned into a runnable program.
    #[error("tool `{name}` cannot be bound: {reason}")]
    Binding {
        /// Identifier of the artifact.
        name: String,
        /// Human-readable cause.
        reason: String,
    },

    /// Tool execution failed.
    #[error("tool execution failed: {reason}")]
    Execution {
        /// Human-readable error returned by the tool implementation.
        reason: String,
    },

    /// Tool execution exceeded its time limit.
    #[error("tool execution timed out after {seconds}s")]
    Timeout {
        /// Limit that was exceeded.
        seconds: u64,
    },

    /// Catalog access failed while binding.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ToolError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Creates a binding error for `name`.
    #[must_use]
    pub fn binding(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Binding {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
