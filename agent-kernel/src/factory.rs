//! Tool creation and invocation.

use std::fmt;
use std::sync::Arc;

use agent_catalog::{ArtifactPersister, Catalog, NewArtifact, ToolRecord};
use agent_credentials::CredentialResolver;
use agent_policy::{SafetyReviewer, SafetyVerdict, analyze};
use agent_primitives::{AgentId, CredentialName, ToolId};
use agent_tools::{ExecutionGuard, InvocationOutcome, ToolHandle, ToolLoader};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{FactoryError, FactoryResult, InvokeError, InvokeResult};
use crate::observer::ReviewObserver;
use crate::synthesizer::CodeSynthesizer;

/// Default number of extra synthesis attempts after an unsafe verdict.
pub const DEFAULT_REVIEW_RETRIES: u32 = 2;

/// Default identifier truncation length.
pub const DEFAULT_IDENTIFIER_MAX_LEN: usize = 40;

/// A request to turn natural language into a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateToolRequest {
    prompt: String,
    name_hint: Option<String>,
    owner: Option<AgentId>,
}

impl CreateToolRequest {
    /// Request for `prompt` with no name hint and no owner.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            name_hint: None,
            owner: None,
        }
    }

    /// Suggests an identifier.
    #[must_use]
    pub fn with_name_hint(mut self, hint: impl Into<String>) -> Self {
        self.name_hint = Some(hint.into());
        self
    }

    /// Links the tool to `owner` once persisted.
    #[must_use]
    pub fn with_owner(mut self, owner: AgentId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Natural-language description.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// A persisted tool.
#[derive(Debug, Clone)]
pub struct CreatedTool {
    /// Catalog record.
    pub record: ToolRecord,
    /// Whether the owner link was written.
    pub linked: bool,
    /// Synthesis attempts used.
    pub attempts: u32,
}

/// Runs the synthesis pipeline and guarded invocations.
///
/// Creation: optimistic credential pass, synthesize and review until a
/// candidate passes or the retry budget runs out, definitive credential
/// pass over the names the code declares, then persistence. Nothing is
/// written unless every step before persistence succeeded.
#[derive(Clone)]
pub struct ToolFactory {
    catalog: Catalog,
    synthesizer: CodeSynthesizer,
    reviewer: Arc<dyn SafetyReviewer>,
    resolver: CredentialResolver,
    loader: ToolLoader,
    guard: ExecutionGuard,
    persister: ArtifactPersister,
    observer: Option<Arc<dyn ReviewObserver>>,
    review_retries: u32,
}

impl fmt::Debug for ToolFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolFactory")
            .field("synthesizer", &self.synthesizer)
            .field("review_retries", &self.review_retries)
            .field("observer_configured", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl ToolFactory {
    /// Creates a factory with the default retry budget and identifier length.
    #[must_use]
    pub fn new(
        catalog: Catalog,
        synthesizer: CodeSynthesizer,
        reviewer: Arc<dyn SafetyReviewer>,
        resolver: CredentialResolver,
        loader: ToolLoader,
        guard: ExecutionGuard,
    ) -> Self {
        Self {
            persister: ArtifactPersister::new(catalog.clone(), DEFAULT_IDENTIFIER_MAX_LEN),
            catalog,
            synthesizer,
            reviewer,
            resolver,
            loader,
            guard,
            observer: None,
            review_retries: DEFAULT_REVIEW_RETRIES,
        }
    }

    /// Sets how many extra attempts follow an unsafe verdict.
    #[must_use]
    pub fn with_review_retries(mut self, retries: u32) -> Self {
        self.review_retries = retries;
        self
    }

    /// Sets the identifier truncation length.
    #[must_use]
    pub fn with_identifier_max_len(mut self, max_len: usize) -> Self {
        self.persister = ArtifactPersister::new(self.catalog.clone(), max_len);
        self
    }

    /// Installs a review observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ReviewObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Catalog the factory writes to.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Loader used for invocations.
    #[must_use]
    pub fn loader(&self) -> &ToolLoader {
        &self.loader
    }

    /// Guard used for invocations.
    #[must_use]
    pub fn guard(&self) -> &ExecutionGuard {
        &self.guard
    }

    /// Turns `request` into a persisted tool.
    ///
    /// # Errors
    ///
    /// - [`FactoryError::InvalidRequest`] for a blank prompt.
    /// - [`FactoryError::Capacity`] / [`FactoryError::Generation`] when
    ///   synthesis or review cannot reach the model.
    /// - [`FactoryError::SafetyRejected`] with the last reasons once the
    ///   retry budget is spent.
    /// - [`FactoryError::MissingCredentials`] when declared names stay
    ///   unsatisfied.
    /// - [`FactoryError::Persistence`] when storage fails.
    pub async fn create_tool(&self, request: CreateToolRequest) -> FactoryResult<CreatedTool> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(FactoryError::invalid_request("prompt cannot be empty"));
        }

        let known = self.resolver.resolve_hints(prompt).await.satisfied();
        debug!(known = known.len(), "optimistic credential pass");

        let ReviewedCandidate {
            code,
            verdict,
            credentials,
            attempts,
        } = self.synthesize_reviewed(prompt, &known).await?;

        let report = self.resolver.resolve(&credentials, prompt).await;
        let missing = report.unsatisfied();
        if !missing.is_empty() {
            warn!(missing = ?missing, "declared credentials cannot be satisfied");
            return Err(FactoryError::MissingCredentials { names: missing });
        }

        let persisted = self
            .persister
            .persist(NewArtifact {
                name_hint: request.name_hint,
                description: prompt.to_owned(),
                source: code,
                credentials,
                owner: request.owner,
                verdict,
            })
            .await?;
        info!(
            tool = %persisted.record.id(),
            attempts,
            linked = persisted.linked,
            "tool created"
        );
        Ok(CreatedTool {
            record: persisted.record,
            linked: persisted.linked,
            attempts,
        })
    }

    async fn synthesize_reviewed(
        &self,
        prompt: &str,
        known: &[CredentialName],
    ) -> FactoryResult<ReviewedCandidate> {
        let mut reasons: Vec<String> = Vec::new();
        for attempt in 1..=self.review_retries.saturating_add(1) {
            let code = self.synthesizer.synthesize(prompt, known, &reasons).await?;
            let verdict = self.reviewer.review(&code).await?;
            if let Some(observer) = &self.observer {
                observer.on_verdict(prompt, attempt, &verdict);
            }
            if verdict.is_safe() {
                let credentials = declared_credentials(&code);
                return Ok(ReviewedCandidate {
                    code,
                    verdict,
                    credentials,
                    attempts: attempt,
                });
            }
            reasons = verdict.reasons().to_vec();
        }
        Err(FactoryError::SafetyRejected { reasons })
    }

    /// Invokes a catalogued tool.
    ///
    /// With an agent context the tool must be part of that agent's loaded
    /// toolset; without one any catalogued tool is reachable.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::UnknownTool`] / [`InvokeError::UnknownAgent`] when
    ///   nothing matches.
    /// - [`InvokeError::MissingCredential`] naming every unsatisfied
    ///   credential; the tool body did not run.
    /// - [`InvokeError::Execution`] when the tool failed.
    pub async fn invoke_tool(
        &self,
        identifier: &str,
        agent: Option<AgentId>,
        arguments: Value,
    ) -> InvokeResult<Value> {
        let handle = self.find_handle(identifier, agent).await?;
        match self.guard.execute(&handle, arguments).await {
            InvocationOutcome::Completed(value) => Ok(value),
            InvocationOutcome::MissingCredentials(names) => {
                Err(InvokeError::MissingCredential { names })
            }
            InvocationOutcome::Failed { reason } => Err(InvokeError::Execution { reason }),
        }
    }

    async fn find_handle(&self, identifier: &str, agent: Option<AgentId>) -> InvokeResult<ToolHandle> {
        let unknown = || InvokeError::UnknownTool {
            name: identifier.to_owned(),
        };
        let id = ToolId::new(identifier).map_err(|_| unknown())?;

        match agent {
            Some(agent_id) => {
                let profile = match self.catalog.agent(agent_id).await {
                    Ok(Some(profile)) => profile,
                    Ok(None) => {
                        return Err(InvokeError::UnknownAgent {
                            id: agent_id.to_string(),
                        });
                    }
                    Err(err) => {
                        warn!(agent = %agent_id, error = %err, "agent lookup failed");
                        return Err(unknown());
                    }
                };
                let loaded = self.loader.load_tools_for_agent(Some(&profile)).await;
                loaded.registry().get(id.as_str()).ok_or_else(unknown)
            }
            None => match self.loader.load_tool(&id).await {
                Ok(Some(handle)) => Ok(handle),
                Ok(None) => Err(unknown()),
                Err(err) => {
                    warn!(tool = %id, error = %err, "tool lookup failed");
                    Err(unknown())
                }
            },
        }
    }
}

struct ReviewedCandidate {
    code: String,
    verdict: SafetyVerdict,
    credentials: Vec<CredentialName>,
    attempts: u32,
}

/// Credential names read with literal `os.getenv` calls.
///
/// A literal that is not a valid credential name is already a scanner
/// finding, so the review rejects that code; here it is only logged and left
/// out.
fn declared_credentials(code: &str) -> Vec<CredentialName> {
    analyze(code)
        .credential_names()
        .iter()
        .filter_map(|name| match CredentialName::new(name.as_str()) {
            Ok(name) => Some(name),
            Err(err) => {
                debug!(name = %name, error = %err, "getenv name is not a credential name; ignored");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_credentials_follow_source_order() {
        let code = "import os\n\ndef f() -> str:\n    \"\"\"Doc.\"\"\"\n    a = os.getenv('WEATHER_KEY')\n    b = os.getenv(\"REGION_KEY\")\n    return a or b or ''\n";
        let names: Vec<String> = declared_credentials(code)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["WEATHER_KEY", "REGION_KEY"]);
    }

    #[test]
    fn invalid_getenv_names_are_findings_not_declarations() {
        let code = "import os\n\ndef f() -> str:\n    \"\"\"Doc.\"\"\"\n    a = os.getenv('GOOD_KEY')\n    b = os.getenv('not-a-name')\n    return a or b or ''\n";
        let names: Vec<String> = declared_credentials(code)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, ["GOOD_KEY"]);
        assert!(
            analyze(code)
                .reasons()
                .iter()
                .any(|reason| reason.contains("not-a-name"))
        );
    }

    #[test]
    fn requests_are_built_fluently() {
        let owner = AgentId::random();
        let request = CreateToolRequest::new("weather")
            .with_name_hint("Weather")
            .with_owner(owner);
        assert_eq!(request.prompt(), "weather");
        assert_eq!(request.name_hint.as_deref(), Some("Weather"));
        assert_eq!(request.owner, Some(owner));
    }
}
