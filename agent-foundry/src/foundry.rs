//! Assembly of the full pipeline from configuration.

use std::sync::Arc;

use agent_adapters::traits::AdapterError;
use agent_adapters::{FailoverGenerator, GenerationError, TextGenerator, gemini_generators};
use agent_catalog::{Catalog, CatalogError, FileDocumentStore, LocalFileStore};
use agent_config::FoundryConfig;
use agent_credentials::{
    CredentialDirectory, CredentialResolver, DisabledDirectory, GeneratorDirectory,
    ProcessEnvironment,
};
use agent_kernel::{
    CodeSynthesizer, CreateToolRequest, CreatedTool, FactoryResult, InvokeResult, ToolFactory,
    TracingReviewObserver, TurnError, TurnExecutor, TurnOutcome,
};
use agent_policy::{ClassifierReviewer, GatedReviewer};
use agent_primitives::AgentId;
use agent_prompts::PromptLibrary;
use agent_tools::{ExecutionGuard, PythonRuntime, ToolLoader, ToolRuntime};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

/// Result alias for foundry assembly and chat turns.
pub type FoundryResult<T> = Result<T, FoundryError>;

/// Failures raised while assembling the foundry or running a chat turn.
#[derive(Debug, Error)]
pub enum FoundryError {
    /// Storage could not be opened or read.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Model adapters could not be configured.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// The generator chain could not be built.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// A chat turn failed.
    #[error(transparent)]
    Turn(#[from] TurnError),
    /// The requested agent is not in the catalog.
    #[error("unknown agent `{id}`")]
    UnknownAgent {
        /// Requested identifier.
        id: String,
    },
}

/// The assembled pipeline.
pub struct Foundry {
    catalog: Catalog,
    factory: ToolFactory,
    turns: TurnExecutor,
}

impl std::fmt::Debug for Foundry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Foundry")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl Foundry {
    /// Opens storage, builds the Gemini failover chain and the Python
    /// runtime, and wires everything together.
    ///
    /// # Errors
    ///
    /// Returns [`FoundryError::Adapter`] when no API key is configured and
    /// [`FoundryError::Catalog`] when a storage directory cannot be created.
    pub async fn from_config(config: &FoundryConfig) -> FoundryResult<Self> {
        let generators = gemini_generators(
            &config.generation.api_keys,
            &config.generation.model,
            config.generation.timeout,
        )?;
        let generator: Arc<dyn TextGenerator> = Arc::new(FailoverGenerator::new(generators)?);

        let documents = FileDocumentStore::open(&config.storage.data_dir).await?;
        let files = LocalFileStore::open(&config.storage.tools_dir).await?;
        let catalog = Catalog::new(Arc::new(documents), Arc::new(files));
        if !catalog.is_available().await {
            return Err(CatalogError::unavailable(format!(
                "document store at {} is not reachable",
                config.storage.data_dir.display()
            ))
            .into());
        }

        let runtime = PythonRuntime::new(&config.execution.python, config.execution.tool_timeout);
        info!(
            model = %config.generation.model,
            keys = config.generation.api_keys.len(),
            data_dir = %config.storage.data_dir.display(),
            "foundry assembled"
        );
        Ok(Self::with_parts(config, catalog, generator, Arc::new(runtime)))
    }

    /// Wires the pipeline over caller-supplied storage, generator and
    /// runtime. Credentials fall back to the process environment.
    #[must_use]
    pub fn with_parts(
        config: &FoundryConfig,
        catalog: Catalog,
        generator: Arc<dyn TextGenerator>,
        runtime: Arc<dyn ToolRuntime>,
    ) -> Self {
        let prompts = Arc::new(PromptLibrary::default());
        let directory: Arc<dyn CredentialDirectory> = if config.discovery.enabled {
            Arc::new(GeneratorDirectory::new(generator.clone(), prompts.clone()))
        } else {
            Arc::new(DisabledDirectory)
        };
        let resolver =
            CredentialResolver::new(catalog.clone(), Arc::new(ProcessEnvironment), directory);

        let guard = ExecutionGuard::new(resolver.clone());
        let loader = ToolLoader::new(
            catalog.clone(),
            runtime,
            config.execution.expose_all_when_unscoped,
        );
        let reviewer = Arc::new(GatedReviewer::new(Arc::new(ClassifierReviewer::new(
            generator.clone(),
            prompts.clone(),
        ))));

        let factory = ToolFactory::new(
            catalog.clone(),
            CodeSynthesizer::new(generator.clone(), prompts.clone()),
            reviewer,
            resolver,
            loader,
            guard.clone(),
        )
        .with_review_retries(config.synthesis.review_retries)
        .with_identifier_max_len(config.synthesis.identifier_max_len)
        .with_observer(Arc::new(TracingReviewObserver));

        let turns = TurnExecutor::new(generator, prompts, guard)
            .with_max_rounds(config.execution.max_tool_rounds);

        Self {
            catalog,
            factory,
            turns,
        }
    }

    /// The catalog of agents, artifacts and credentials.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The synthesis and invocation pipeline.
    #[must_use]
    pub fn factory(&self) -> &ToolFactory {
        &self.factory
    }

    /// See [`ToolFactory::create_tool`].
    ///
    /// # Errors
    ///
    /// Propagates [`agent_kernel::FactoryError`].
    pub async fn create_tool(&self, request: CreateToolRequest) -> FactoryResult<CreatedTool> {
        self.factory.create_tool(request).await
    }

    /// See [`ToolFactory::invoke_tool`].
    ///
    /// # Errors
    ///
    /// Propagates [`agent_kernel::InvokeError`].
    pub async fn invoke_tool(
        &self,
        identifier: &str,
        agent: Option<AgentId>,
        arguments: Value,
    ) -> InvokeResult<Value> {
        self.factory.invoke_tool(identifier, agent, arguments).await
    }

    /// Runs one chat turn for `agent`, or the default agent when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`FoundryError::UnknownAgent`] for an unknown identifier and
    /// [`FoundryError::Turn`] when the model cannot be reached.
    pub async fn chat(&self, agent: Option<AgentId>, message: &str) -> FoundryResult<TurnOutcome> {
        let profile = match agent {
            Some(id) => Some(self.catalog.agent(id).await?.ok_or_else(|| {
                FoundryError::UnknownAgent { id: id.to_string() }
            })?),
            None => None,
        };
        let toolset = self
            .factory
            .loader()
            .load_tools_for_agent(profile.as_ref())
            .await;
        Ok(self.turns.run_turn(&toolset, message).await?)
    }
}
