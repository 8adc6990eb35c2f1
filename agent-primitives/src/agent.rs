//! Agent configuration bound to a model and an ordered tool list.

use serde::{Deserialize, Serialize};

use crate::{AgentId, ToolId};

/// Name given to the agent created when the catalog holds none.
pub const DEFAULT_AGENT_NAME: &str = "Dynamic Assistant";

/// Model identifier used by the default agent.
pub const DEFAULT_AGENT_MODEL: &str = "gemini-2.5-flash";

/// Instruction given to the default agent.
pub const DEFAULT_AGENT_INSTRUCTION: &str = "You are a helpful AI assistant with access to tools. \
Always check your available tools and use them when they can help the user.";

/// Named configuration binding a model, an optional instruction and tools.
///
/// Tool references are non-owning: removing an agent never removes the
/// artifacts it points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    id: AgentId,
    name: String,
    model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instruction: Option<String>,
    #[serde(default)]
    tools: Vec<ToolId>,
}

impl AgentProfile {
    /// Starts building an [`AgentProfile`].
    #[must_use]
    pub fn builder(id: AgentId) -> AgentProfileBuilder {
        AgentProfileBuilder {
            id,
            name: None,
            model: None,
            instruction: None,
            tools: Vec::new(),
        }
    }

    /// Returns the default agent profile with a fresh identifier.
    #[must_use]
    pub fn default_agent() -> Self {
        Self {
            id: AgentId::random(),
            name: DEFAULT_AGENT_NAME.to_owned(),
            model: DEFAULT_AGENT_MODEL.to_owned(),
            instruction: Some(DEFAULT_AGENT_INSTRUCTION.to_owned()),
            tools: Vec::new(),
        }
    }

    /// Returns the agent identifier.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Returns the agent display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the optional behavioural instruction.
    #[must_use]
    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    /// Returns the ordered tool references.
    #[must_use]
    pub fn tools(&self) -> &[ToolId] {
        &self.tools
    }

    /// Returns true when the agent references the supplied tool.
    #[must_use]
    pub fn has_tool(&self, tool: &ToolId) -> bool {
        self.tools.contains(tool)
    }

    /// Appends a tool reference, ignoring duplicates. Returns true when added.
    pub fn attach_tool(&mut self, tool: ToolId) -> bool {
        if self.has_tool(&tool) {
            return false;
        }
        self.tools.push(tool);
        true
    }

    /// Removes a tool reference. Returns true when it was present.
    pub fn detach_tool(&mut self, tool: &ToolId) -> bool {
        let before = self.tools.len();
        self.tools.retain(|existing| existing != tool);
        before != self.tools.len()
    }
}

/// Builder for [`AgentProfile`].
#[derive(Debug)]
pub struct AgentProfileBuilder {
    id: AgentId,
    name: Option<String>,
    model: Option<String>,
    instruction: Option<String>,
    tools: Vec<ToolId>,
}

impl AgentProfileBuilder {
    /// Sets the human-readable name for the agent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidAgent`] when the name is empty.
    pub fn name(mut self, name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(crate::Error::InvalidAgent {
                reason: "agent name cannot be empty".into(),
            });
        }
        self.name = Some(name);
        Ok(self)
    }

    /// Sets the model identifier.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidAgent`] when the model identifier is empty.
    pub fn model(mut self, model: impl Into<String>) -> crate::Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(crate::Error::InvalidAgent {
                reason: "agent model cannot be empty".into(),
            });
        }
        self.model = Some(model);
        Ok(self)
    }

    /// Sets the behavioural instruction.
    #[must_use]
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Appends a tool reference.
    #[must_use]
    pub fn tool(mut self, tool: ToolId) -> Self {
        if !self.tools.contains(&tool) {
            self.tools.push(tool);
        }
        self
    }

    /// Consumes the builder and returns the profile.
    ///
    /// The model falls back to [`DEFAULT_AGENT_MODEL`] when unset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidAgent`] if the name is missing.
    pub fn build(self) -> crate::Result<AgentProfile> {
        let name = self.name.ok_or_else(|| crate::Error::InvalidAgent {
            reason: "agent name must be provided".into(),
        })?;

        Ok(AgentProfile {
            id: self.id,
            name,
            model: self
                .model
                .unwrap_or_else(|| DEFAULT_AGENT_MODEL.to_owned()),
            instruction: self.instruction,
            tools: self.tools,
        })
    }
}
