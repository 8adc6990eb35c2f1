//! Runtime tool synthesis for AI agents.
//!
//! Depend on this crate to get the whole pipeline: [`Foundry`] wires the
//! catalog, generation, review, credential resolution and guarded execution
//! from a [`config::FoundryConfig`]. The component crates are re-exported
//! for callers that assemble their own pipeline.

#![warn(missing_docs, clippy::pedantic)]

mod foundry;

pub use foundry::{Foundry, FoundryError, FoundryResult};

/// Shared identifiers and agent profiles.
pub use agent_primitives as primitives;

/// Synthesis pipeline, guarded invocation and the turn loop.
pub use agent_kernel as kernel;

/// Model adapters and the text generation contract.
pub use agent_adapters as adapters;

/// Tool loading, credential scoping and execution.
pub use agent_tools as tools;

/// Agents, artifacts and credential records.
pub use agent_catalog as catalog;

/// Credential resolution and discovery.
pub use agent_credentials as credentials;

/// Static scanning and safety review.
pub use agent_policy as policy;

/// Prompt texts and templating.
pub use agent_prompts as prompts;

/// Environment-driven configuration.
pub use agent_config as config;

/// Tracing subscriber setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use agent_telemetry as telemetry;
