//! Resolves an agent's catalog references into invocable handles.

use std::fmt;
use std::sync::Arc;

use agent_catalog::{Catalog, ToolRecord};
use agent_policy::analyze;
use agent_primitives::{AgentProfile, ToolId};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::registry::{Tool, ToolHandle, ToolMetadata, ToolRegistry};
use crate::runtime::{ArtifactProgram, ToolRuntime};
use crate::scope::CredentialScope;
use crate::{ToolError, ToolResult};

/// Tools loaded for one agent.
#[derive(Debug)]
pub struct LoadedToolset {
    agent: Option<AgentProfile>,
    registry: ToolRegistry,
    skipped: Vec<ToolId>,
}

impl LoadedToolset {
    /// Wraps a registry assembled by hand.
    #[must_use]
    pub fn from_registry(agent: Option<AgentProfile>, registry: ToolRegistry) -> Self {
        Self {
            agent,
            registry,
            skipped: Vec::new(),
        }
    }

    /// Agent the set was loaded for.
    #[must_use]
    pub fn agent(&self) -> Option<&AgentProfile> {
        self.agent.as_ref()
    }

    /// Loaded tools.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// References that had no catalog record.
    #[must_use]
    pub fn skipped(&self) -> &[ToolId] {
        &self.skipped
    }
}

/// Builds toolsets from the catalog.
///
/// Catalog records are authoritative: a reference without a record is
/// skipped with a warning and never fails the load. Source is bound lazily
/// on first invocation.
#[derive(Clone)]
pub struct ToolLoader {
    catalog: Catalog,
    runtime: Arc<dyn ToolRuntime>,
    expose_all: bool,
}

impl fmt::Debug for ToolLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolLoader")
            .field("expose_all", &self.expose_all)
            .finish_non_exhaustive()
    }
}

impl ToolLoader {
    /// Creates a loader.
    ///
    /// With `expose_all`, unscoped loads expose every catalog artifact.
    #[must_use]
    pub fn new(catalog: Catalog, runtime: Arc<dyn ToolRuntime>, expose_all: bool) -> Self {
        Self {
            catalog,
            runtime,
            expose_all,
        }
    }

    /// Loads the tools for `agent`, or for the default agent when `None`.
    pub async fn load_tools_for_agent(&self, agent: Option<&AgentProfile>) -> LoadedToolset {
        let (agent, records, skipped) = match agent {
            Some(agent) => {
                let (records, skipped) = self.records_for(agent.tools()).await;
                (Some(agent.clone()), records, skipped)
            }
            None => {
                let default = match self.catalog.ensure_default_agent().await {
                    Ok(agent) => Some(agent),
                    Err(err) => {
                        warn!(error = %err, "default agent unavailable");
                        None
                    }
                };
                if self.expose_all {
                    (default, self.catalog.list_tools().await, Vec::new())
                } else {
                    let ids = default
                        .as_ref()
                        .map(|agent| agent.tools().to_vec())
                        .unwrap_or_default();
                    let (records, skipped) = self.records_for(&ids).await;
                    (default, records, skipped)
                }
            }
        };

        let registry = ToolRegistry::new();
        for record in records {
            let handle = self.handle_for(record);
            if let Err(err) = registry.register(handle) {
                debug!(error = %err, "duplicate reference ignored");
            }
        }
        debug!(
            agent = ?agent.as_ref().map(AgentProfile::id),
            loaded = registry.len(),
            skipped = skipped.len(),
            "toolset loaded"
        );
        LoadedToolset {
            agent,
            registry,
            skipped,
        }
    }

    /// Handle for a single artifact, bypassing agent membership.
    ///
    /// Returns `Ok(None)` when the catalog has no record for `id`.
    ///
    /// # Errors
    ///
    /// Propagates catalog failures.
    pub async fn load_tool(&self, id: &ToolId) -> ToolResult<Option<ToolHandle>> {
        Ok(self.catalog.tool(id).await?.map(|record| self.handle_for(record)))
    }

    async fn records_for(&self, ids: &[ToolId]) -> (Vec<ToolRecord>, Vec<ToolId>) {
        let mut records = Vec::new();
        let mut skipped = Vec::new();
        for id in ids {
            match self.catalog.tool(id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    warn!(tool = %id, "agent references a tool missing from the catalog");
                    skipped.push(id.clone());
                }
                Err(err) => {
                    warn!(tool = %id, error = %err, "tool record unreadable");
                    skipped.push(id.clone());
                }
            }
        }
        (records, skipped)
    }

    fn handle_for(&self, record: ToolRecord) -> ToolHandle {
        let metadata = ToolMetadata::from(&record);
        ToolHandle::new(
            metadata,
            ArtifactTool {
                catalog: self.catalog.clone(),
                runtime: Arc::clone(&self.runtime),
                id: record.id().clone(),
                program: OnceCell::new(),
            },
        )
    }
}

struct ArtifactTool {
    catalog: Catalog,
    runtime: Arc<dyn ToolRuntime>,
    id: ToolId,
    program: OnceCell<ArtifactProgram>,
}

impl ArtifactTool {
    async fn bind(&self) -> ToolResult<ArtifactProgram> {
        let source = self
            .catalog
            .tool_source(&self.id)
            .await?
            .ok_or_else(|| ToolError::binding(self.id.as_str(), "source file is missing"))?;
        let analysis = analyze(&source);
        let entrypoint = analysis
            .entrypoint()
            .ok_or_else(|| ToolError::binding(self.id.as_str(), "no entrypoint function found"))?;
        debug!(tool = %self.id, entrypoint, "artifact bound");
        Ok(ArtifactProgram::new(self.id.clone(), entrypoint, source))
    }
}

#[async_trait]
impl Tool for ArtifactTool {
    async fn invoke(&self, input: Value, scope: CredentialScope) -> ToolResult<Value> {
        let program = self.program.get_or_try_init(|| self.bind()).await?;
        self.runtime.run(program, input, &scope).await
    }
}
