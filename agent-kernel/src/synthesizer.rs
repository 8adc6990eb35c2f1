//! Code synthesis from natural-language requests.

use std::fmt;
use std::sync::Arc;

use agent_adapters::{GenerationError, GenerationRequest, TextGenerator};
use agent_primitives::CredentialName;
use agent_prompts::PromptLibrary;
use tracing::debug;

use crate::error::{FactoryError, FactoryResult};

const SYNTHESIS_TEMPERATURE: f32 = 0.2;
const SYNTHESIS_MAX_TOKENS: u32 = 2048;

/// Turns a request plus known credential names into candidate source.
#[derive(Clone)]
pub struct CodeSynthesizer {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLibrary>,
}

impl fmt::Debug for CodeSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeSynthesizer")
            .field("generator", &self.generator.label())
            .finish_non_exhaustive()
    }
}

impl CodeSynthesizer {
    /// Creates a synthesizer.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: Arc<PromptLibrary>) -> Self {
        Self { generator, prompts }
    }

    /// Generates one candidate.
    ///
    /// `rejection_reasons` carries the previous review's findings so the
    /// next attempt can address them.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::Capacity`] when generation capacity is
    /// exhausted and [`FactoryError::Generation`] for other failures,
    /// including an empty reply.
    pub async fn synthesize(
        &self,
        request: &str,
        known_credentials: &[CredentialName],
        rejection_reasons: &[String],
    ) -> FactoryResult<String> {
        let credentials: Vec<String> = known_credentials.iter().map(ToString::to_string).collect();
        let prompt = self
            .prompts
            .synthesis(request, &credentials, rejection_reasons)?;
        let generation = GenerationRequest::new(self.prompts.synthesis_system.clone(), prompt)
            .with_temperature(SYNTHESIS_TEMPERATURE)
            .with_max_output_tokens(SYNTHESIS_MAX_TOKENS);
        let reply = self.generator.generate_text(&generation).await?;
        let code = strip_code_fences(&reply);
        if code.trim().is_empty() {
            return Err(FactoryError::from(GenerationError::generation(
                "model returned no code",
            )));
        }
        debug!(
            generator = self.generator.label(),
            bytes = code.len(),
            feedback = rejection_reasons.len(),
            "candidate synthesized"
        );
        Ok(code)
    }
}

/// Removes a surrounding markdown fence, keeping the body.
///
/// Text without a leading fence is returned trimmed.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return format!("{trimmed}\n");
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    format!("{}\n", body.trim_end())
}
