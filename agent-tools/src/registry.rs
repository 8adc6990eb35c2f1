//! Runtime registry for loaded tools.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use agent_catalog::ToolRecord;
use agent_primitives::{CredentialName, ToolId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scope::CredentialScope;
use crate::{ToolError, ToolResult};

/// Metadata describing a loaded tool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolMetadata {
    id: ToolId,
    description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    credentials: Vec<CredentialName>,
}

impl ToolMetadata {
    /// Creates metadata for the supplied identifier.
    #[must_use]
    pub fn new(id: ToolId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            credentials: Vec::new(),
        }
    }

    /// Declares the credential names the tool reads.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Vec<CredentialName>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Returns the tool identifier.
    #[must_use]
    pub fn id(&self) -> &ToolId {
        &self.id
    }

    /// Returns the description shown to models.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the declared credential names.
    #[must_use]
    pub fn credentials(&self) -> &[CredentialName] {
        &self.credentials
    }
}

impl From<&ToolRecord> for ToolMetadata {
    fn from(record: &ToolRecord) -> Self {
        Self::new(record.id().clone(), record.description())
            .with_credentials(record.credentials().to_vec())
    }
}

/// Trait implemented by tool executors.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Invokes the tool with JSON arguments and the credentials in scope.
    async fn invoke(&self, input: Value, scope: CredentialScope) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> Tool for F
where
    F: Send + Sync + Fn(Value, CredentialScope) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send,
{
    async fn invoke(&self, input: Value, scope: CredentialScope) -> ToolResult<Value> {
        (self)(input, scope).await
    }
}

/// Handle returned by the registry for direct invocation.
#[derive(Clone)]
pub struct ToolHandle {
    metadata: ToolMetadata,
    executor: Arc<dyn Tool>,
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl ToolHandle {
    /// Wraps an executor.
    pub fn new(metadata: ToolMetadata, executor: impl Tool + 'static) -> Self {
        Self {
            metadata,
            executor: Arc::new(executor),
        }
    }

    /// Returns the associated metadata.
    #[must_use]
    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    /// Executes the underlying tool implementation.
    ///
    /// Callers normally go through [`crate::ExecutionGuard`], which resolves
    /// and scopes credentials first.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by the implementation.
    pub async fn invoke(&self, input: Value, scope: CredentialScope) -> ToolResult<Value> {
        self.executor.invoke(input, scope).await
    }
}

/// Registry that stores tool handles keyed by identifier.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<BTreeMap<ToolId, ToolHandle>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.ids())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the identifier is already present.
    pub fn register(&self, handle: ToolHandle) -> ToolResult<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = handle.metadata().id().clone();
        if inner.contains_key(&id) {
            return Err(ToolError::DuplicateTool {
                name: id.to_string(),
            });
        }
        inner.insert(id, handle);
        Ok(())
    }

    /// Registers a tool implementation.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if the identifier is already present.
    pub fn register_tool<T>(&self, metadata: ToolMetadata, tool: T) -> ToolResult<()>
    where
        T: Tool + 'static,
    {
        self.register(ToolHandle::new(metadata, tool))
    }

    /// Returns a handle to the tool matching the supplied name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ToolHandle> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .iter()
            .find_map(|(id, handle)| (id.as_str() == name).then(|| handle.clone()))
    }

    /// Invokes a registered tool with the given scope, bypassing resolution.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] when the tool is not found or
    /// propagates the implementation's error.
    pub async fn invoke(&self, name: &str, input: Value, scope: CredentialScope) -> ToolResult<Value> {
        let handle = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_owned(),
        })?;
        handle.invoke(input, scope).await
    }

    /// Registered identifiers, ordered.
    #[must_use]
    pub fn ids(&self) -> Vec<ToolId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.keys().cloned().collect()
    }

    /// Metadata of all registered tools, ordered by identifier.
    #[must_use]
    pub fn list(&self) -> Vec<ToolMetadata> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.values().map(|handle| handle.metadata.clone()).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(id: &str) -> ToolMetadata {
        ToolMetadata::new(ToolId::new(id).unwrap(), "Echo incoming payload")
            .with_credentials(vec![CredentialName::new("ECHO_KEY").unwrap()])
    }

    #[tokio::test]
    async fn register_and_invoke_tool() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(metadata("echo"), |input: Value, scope: CredentialScope| async move {
                Ok(serde_json::json!({ "input": input, "key": scope.get("ECHO_KEY") }))
            })
            .unwrap();

        let payload = serde_json::json!({ "message": "hello" });
        let output = registry
            .invoke("echo", payload.clone(), CredentialScope::empty())
            .await
            .unwrap();
        assert_eq!(output, serde_json::json!({ "input": payload, "key": null }));
        assert_eq!(registry.list()[0].credentials().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_registration_errors() {
        let registry = ToolRegistry::new();
        registry
            .register_tool(metadata("echo"), |input: Value, _: CredentialScope| async move {
                Ok(input)
            })
            .unwrap();

        let err = registry
            .register_tool(metadata("echo"), |v: Value, _: CredentialScope| async move { Ok(v) })
            .expect_err("duplicate registration should fail");

        assert!(matches!(err, ToolError::DuplicateTool { name } if name == "echo"));
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke("missing", Value::Null, CredentialScope::empty())
            .await
            .expect_err("unknown tool should error");

        assert!(matches!(err, ToolError::UnknownTool { name } if name == "missing"));
        assert!(registry.is_empty());
    }
}
