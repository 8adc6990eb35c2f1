//! Typed catalog over agents, tool records and credential records.

use std::fmt;
use std::sync::Arc;

use agent_primitives::{AgentId, AgentProfile, CredentialName, DEFAULT_AGENT_NAME, ToolId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::files::FileStore;
use crate::records::{CredentialRecord, CredentialSummary, ToolRecord};
use crate::store::DocumentStore;
use crate::{CatalogError, CatalogResult};

/// Collection holding [`AgentProfile`] documents.
pub const AGENTS: &str = "agents";
/// Collection holding [`ToolRecord`] documents.
pub const TOOLS: &str = "tools";
/// Collection holding [`CredentialRecord`] documents.
pub const CREDENTIALS: &str = "credentials";

/// Catalog facade shared by the pipeline, the loader and the resolver.
///
/// Lookups are catalog-first: a source file without a record is invisible
/// here, and a record whose file went missing reads as absent source.
/// Listing operations degrade to empty results when the document store is
/// unreachable so read paths never crash.
///
/// Clones share one link lock, so read-modify-write updates of agent tool
/// lists made through any clone are serialized.
#[derive(Clone)]
pub struct Catalog {
    documents: Arc<dyn DocumentStore>,
    files: Arc<dyn FileStore>,
    links: Arc<Mutex<()>>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog").finish_non_exhaustive()
    }
}

impl Catalog {
    /// Creates a catalog over the supplied stores.
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>, files: Arc<dyn FileStore>) -> Self {
        Self {
            documents,
            files,
            links: Arc::new(Mutex::new(())),
        }
    }

    /// Source file store.
    #[must_use]
    pub fn files(&self) -> &Arc<dyn FileStore> {
        &self.files
    }

    /// Returns true when the document store answers a ping.
    pub async fn is_available(&self) -> bool {
        match self.documents.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "document store unreachable");
                false
            }
        }
    }

    // Agents.

    /// Returns the default agent, creating it when no agent exists.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn ensure_default_agent(&self) -> CatalogResult<AgentProfile> {
        let agents: Vec<AgentProfile> = self.load_all(AGENTS).await?;
        if let Some(existing) = agents
            .iter()
            .find(|agent| agent.name() == DEFAULT_AGENT_NAME)
            .or_else(|| agents.first())
        {
            return Ok(existing.clone());
        }
        let profile = AgentProfile::default_agent();
        self.create_agent(&profile).await?;
        info!(agent = %profile.id(), "default agent created");
        Ok(profile)
    }

    /// Stores a new agent.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] when the id is taken.
    pub async fn create_agent(&self, profile: &AgentProfile) -> CatalogResult<()> {
        self.documents
            .insert(AGENTS, &profile.id().to_string(), encode(profile)?)
            .await
    }

    /// Replaces a stored agent.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn save_agent(&self, profile: &AgentProfile) -> CatalogResult<()> {
        self.documents
            .put(AGENTS, &profile.id().to_string(), encode(profile)?)
            .await
    }

    /// Fetches one agent.
    ///
    /// # Errors
    ///
    /// Propagates store and decoding failures.
    pub async fn agent(&self, id: AgentId) -> CatalogResult<Option<AgentProfile>> {
        self.documents
            .get(AGENTS, &id.to_string())
            .await?
            .map(decode)
            .transpose()
    }

    /// Lists agents, empty when the store is unreachable.
    pub async fn list_agents(&self) -> Vec<AgentProfile> {
        self.list_or_empty(AGENTS).await
    }

    /// Deletes an agent. The artifacts it referenced stay in the catalog.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete_agent(&self, id: AgentId) -> CatalogResult<bool> {
        self.documents.delete(AGENTS, &id.to_string()).await
    }

    /// Appends `tool` to the agent's tool list.
    ///
    /// Returns `false` when the tool was already linked.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when the agent does not exist.
    pub async fn link_tool(&self, agent: AgentId, tool: &ToolId) -> CatalogResult<bool> {
        let _links = self.links.lock().await;
        let mut profile = self
            .agent(agent)
            .await?
            .ok_or_else(|| CatalogError::not_found(AGENTS, agent.to_string()))?;
        if !profile.attach_tool(tool.clone()) {
            return Ok(false);
        }
        self.save_agent(&profile).await?;
        debug!(agent = %agent, tool = %tool, "tool linked to agent");
        Ok(true)
    }

    // Tools.

    /// Stores a new tool record.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] when the id is taken.
    pub async fn insert_tool(&self, record: &ToolRecord) -> CatalogResult<()> {
        self.documents
            .insert(TOOLS, record.id().as_str(), encode(record)?)
            .await
    }

    /// Fetches one tool record.
    ///
    /// # Errors
    ///
    /// Propagates store and decoding failures.
    pub async fn tool(&self, id: &ToolId) -> CatalogResult<Option<ToolRecord>> {
        self.documents
            .get(TOOLS, id.as_str())
            .await?
            .map(decode)
            .transpose()
    }

    /// Reads the source of a catalogued tool.
    ///
    /// Returns `None` when either the record or its file is missing.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn tool_source(&self, id: &ToolId) -> CatalogResult<Option<String>> {
        if self.tool(id).await?.is_none() {
            return Ok(None);
        }
        self.files.read(id).await
    }

    /// Lists tool records, empty when the store is unreachable.
    pub async fn list_tools(&self) -> Vec<ToolRecord> {
        self.list_or_empty(TOOLS).await
    }

    /// Lists identifiers straight from the source store, records or not.
    ///
    /// # Errors
    ///
    /// Propagates file store failures.
    pub async fn browse_tool_files(&self) -> CatalogResult<Vec<ToolId>> {
        self.files.list().await
    }

    /// Removes a tool: its record, every agent link and its source file.
    ///
    /// Returns whether a record existed. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete_tool(&self, id: &ToolId) -> CatalogResult<bool> {
        let existed = self.documents.delete(TOOLS, id.as_str()).await?;
        {
            let _links = self.links.lock().await;
            let agents: Vec<AgentProfile> = self.load_all(AGENTS).await?;
            for mut agent in agents {
                if agent.detach_tool(id) {
                    self.save_agent(&agent).await?;
                    debug!(agent = %agent.id(), tool = %id, "tool detached from agent");
                }
            }
        }
        self.files.remove(id).await?;
        info!(tool = %id, existed, "tool deleted");
        Ok(existed)
    }

    // Credentials.

    /// Fetches one credential record.
    ///
    /// # Errors
    ///
    /// Propagates store and decoding failures.
    pub async fn credential(&self, name: &CredentialName) -> CatalogResult<Option<CredentialRecord>> {
        self.documents
            .get(CREDENTIALS, name.as_str())
            .await?
            .map(decode)
            .transpose()
    }

    /// Inserts or replaces a credential by name.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn upsert_credential(&self, record: &CredentialRecord) -> CatalogResult<CredentialSummary> {
        self.documents
            .put(CREDENTIALS, record.name().as_str(), encode(record)?)
            .await?;
        info!(credential = %record.name(), source = ?record.source(), "credential stored");
        Ok(record.summary())
    }

    /// Inserts a credential unless the name is already registered.
    ///
    /// Returns `false` when an existing record was kept.
    ///
    /// # Errors
    ///
    /// Propagates store failures other than the conflict.
    pub async fn insert_credential(&self, record: &CredentialRecord) -> CatalogResult<bool> {
        match self
            .documents
            .insert(CREDENTIALS, record.name().as_str(), encode(record)?)
            .await
        {
            Ok(()) => Ok(true),
            Err(CatalogError::Conflict { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Full credential records, empty when the store is unreachable.
    ///
    /// Values are included; callers must not surface them.
    pub async fn credential_records(&self) -> Vec<CredentialRecord> {
        self.list_or_empty(CREDENTIALS).await
    }

    /// Masked credential views for administrators.
    pub async fn list_credentials(&self) -> Vec<CredentialSummary> {
        self.credential_records()
            .await
            .iter()
            .map(CredentialRecord::summary)
            .collect()
    }

    /// Deletes a credential record.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn delete_credential(&self, name: &CredentialName) -> CatalogResult<bool> {
        self.documents.delete(CREDENTIALS, name.as_str()).await
    }

    async fn load_all<T: DeserializeOwned>(&self, collection: &str) -> CatalogResult<Vec<T>> {
        let documents = self.documents.list(collection).await?;
        let mut decoded = Vec::with_capacity(documents.len());
        for document in documents {
            match decode(document) {
                Ok(value) => decoded.push(value),
                Err(err) => warn!(collection, error = %err, "skipping undecodable record"),
            }
        }
        Ok(decoded)
    }

    async fn list_or_empty<T: DeserializeOwned>(&self, collection: &str) -> Vec<T> {
        self.load_all(collection).await.unwrap_or_else(|err| {
            warn!(collection, error = %err, "listing degraded to empty");
            Vec::new()
        })
    }
}

fn encode<T: Serialize>(value: &T) -> CatalogResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn decode<T: DeserializeOwned>(value: Value) -> CatalogResult<T> {
    Ok(serde_json::from_value(value)?)
}
