//! Best-effort discovery of public or free-tier credentials.

use std::fmt;
use std::sync::Arc;

use agent_adapters::{GenerationError, GenerationRequest, TextGenerator};
use agent_primitives::CredentialName;
use agent_prompts::{PromptLibrary, TemplateError};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const DISCOVERY_MAX_TOKENS: u32 = 256;

/// Failure raised while asking a directory for a credential.
///
/// The resolver logs these and treats the name as unsatisfied.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Generation failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Prompt rendering failed.
    #[error("discovery prompt could not be rendered: {0}")]
    Prompt(#[from] TemplateError),
}

/// Result alias for discovery.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Directory of public credentials.
#[async_trait]
pub trait CredentialDirectory: Send + Sync {
    /// Looks for a usable value for `name` given what the tool should do.
    ///
    /// `Ok(None)` means nothing was found.
    async fn discover(
        &self,
        name: &CredentialName,
        description: &str,
    ) -> DiscoveryResult<Option<String>>;
}

/// Directory that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDirectory;

#[async_trait]
impl CredentialDirectory for DisabledDirectory {
    async fn discover(
        &self,
        _name: &CredentialName,
        _description: &str,
    ) -> DiscoveryResult<Option<String>> {
        Ok(None)
    }
}

/// Directory backed by a text generator that knows public API catalogues.
pub struct GeneratorDirectory {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLibrary>,
}

impl fmt::Debug for GeneratorDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorDirectory")
            .field("generator", &self.generator.label())
            .finish_non_exhaustive()
    }
}

impl GeneratorDirectory {
    /// Creates a directory over `generator`.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: Arc<PromptLibrary>) -> Self {
        Self { generator, prompts }
    }
}

#[async_trait]
impl CredentialDirectory for GeneratorDirectory {
    async fn discover(
        &self,
        name: &CredentialName,
        description: &str,
    ) -> DiscoveryResult<Option<String>> {
        let prompt = self.prompts.discovery(name.as_str(), description)?;
        let request = GenerationRequest::new(self.prompts.discovery_system.clone(), prompt)
            .with_temperature(0.0)
            .with_max_output_tokens(DISCOVERY_MAX_TOKENS);
        let reply = self.generator.generate_text(&request).await?;
        let found = parse_discovery(&reply);
        debug!(credential = %name, found = found.is_some(), "discovery answered");
        Ok(found)
    }
}

#[derive(Deserialize)]
struct DiscoveryAnswer {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    value: Option<String>,
}

/// Parses a discovery reply, tolerating surrounding markdown fences.
///
/// Returns a value only for `{"found": true, "value": "<non-blank>"}`.
#[must_use]
pub fn parse_discovery(reply: &str) -> Option<String> {
    let answer: DiscoveryAnswer = serde_json::from_str(strip_fences(reply)).ok()?;
    if !answer.found {
        return None;
    }
    answer
        .value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
