//! Core shared types for the tool foundry.
//!
//! Identifiers are validated on construction so that anything holding a
//! [`ToolId`] or [`CredentialName`] can use it as a file name or environment
//! key without further checks.

#![warn(missing_docs, clippy::pedantic)]

mod agent;
mod error;
mod ids;

/// Agent configuration and builder.
pub use agent::{
    AgentProfile, AgentProfileBuilder, DEFAULT_AGENT_INSTRUCTION, DEFAULT_AGENT_MODEL,
    DEFAULT_AGENT_NAME,
};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifier newtypes.
pub use ids::{AgentId, CredentialName, ToolId};
