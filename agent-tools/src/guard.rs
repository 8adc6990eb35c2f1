//! Credential-scoped invocation of loaded tools.

use std::fmt;
use std::panic::AssertUnwindSafe;

use agent_credentials::CredentialResolver;
use agent_primitives::CredentialName;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::registry::ToolHandle;
use crate::scope::CredentialScope;

/// Result of one guarded invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// The tool returned a value.
    Completed(Value),
    /// Declared credentials had no value; the tool did not run.
    MissingCredentials(Vec<CredentialName>),
    /// The tool failed or panicked.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

impl InvocationOutcome {
    /// Returns true for [`InvocationOutcome::Completed`].
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Resolves, scopes and runs tool invocations.
///
/// Each call receives a fresh [`CredentialScope`] holding only the
/// credentials its tool declares. No process-wide state is touched, so
/// invocations run concurrently and one tool's credentials never reach
/// another call, even when a tool fails or panics.
#[derive(Clone)]
pub struct ExecutionGuard {
    resolver: CredentialResolver,
}

impl fmt::Debug for ExecutionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionGuard").finish_non_exhaustive()
    }
}

impl ExecutionGuard {
    /// Creates a guard resolving credentials through `resolver`.
    #[must_use]
    pub fn new(resolver: CredentialResolver) -> Self {
        Self { resolver }
    }

    /// Runs `handle` with `input`.
    pub async fn execute(&self, handle: &ToolHandle, input: Value) -> InvocationOutcome {
        let metadata = handle.metadata();
        let report = self
            .resolver
            .resolve(metadata.credentials(), metadata.description())
            .await;
        let missing = report.unsatisfied();
        if !missing.is_empty() {
            debug!(tool = %metadata.id(), missing = ?missing, "invocation skipped for missing credentials");
            return InvocationOutcome::MissingCredentials(missing);
        }

        let scope = CredentialScope::from(report.values());
        let result = AssertUnwindSafe(handle.invoke(input, scope))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(value)) => InvocationOutcome::Completed(value),
            Ok(Err(err)) => {
                debug!(tool = %metadata.id(), error = %err, "tool failed");
                InvocationOutcome::Failed {
                    reason: err.to_string(),
                }
            }
            Err(_) => {
                warn!(tool = %metadata.id(), "tool panicked");
                InvocationOutcome::Failed {
                    reason: format!("tool `{}` panicked", metadata.id()),
                }
            }
        }
    }
}
