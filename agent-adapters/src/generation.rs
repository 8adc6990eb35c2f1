//! Single-shot text generation on top of [`ModelAdapter`].
//!
//! The foundry only ever needs "prompt in, text out". [`TextGenerator`] is
//! that contract; [`AdapterGenerator`] fulfils it with any adapter and a
//! bounded timeout, and [`FailoverGenerator`] walks an ordered list of
//! generators (one per API key) while failures are capacity related.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::gemini::{GeminiAdapter, GeminiConfig};
use crate::traits::{
    AdapterError, AdapterResult, InferenceRequest, ModelAdapter, PromptMessage, collect_text,
};

/// Result alias for generation calls.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Failure of a generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The capability is temporarily exhausted (quota, rate limit, timeout).
    #[error("generation capacity exhausted: {reason}")]
    Capacity {
        /// Provider detail.
        reason: String,
    },
    /// Any other failure.
    #[error("generation failed: {reason}")]
    Generation {
        /// Provider detail.
        reason: String,
    },
}

impl GenerationError {
    /// Convenience constructor for capacity failures.
    #[must_use]
    pub fn capacity(reason: impl Into<String>) -> Self {
        Self::Capacity {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for other failures.
    #[must_use]
    pub fn generation(reason: impl Into<String>) -> Self {
        Self::Generation {
            reason: reason.into(),
        }
    }

    /// Returns true for [`GenerationError::Capacity`].
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::Capacity { .. })
    }
}

impl From<AdapterError> for GenerationError {
    fn from(err: AdapterError) -> Self {
        if err.is_capacity() {
            Self::capacity(err.to_string())
        } else {
            Self::generation(err.to_string())
        }
    }
}

/// One generation call: system instruction, user prompt, sampling settings.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    system: String,
    prompt: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GenerationRequest {
    /// Creates a request with temperature 0 and a 1024-token budget.
    #[must_use]
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.0,
            max_output_tokens: 1024,
        }
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the output token budget.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Returns the system instruction.
    #[must_use]
    pub fn system(&self) -> &str {
        &self.system
    }

    /// Returns the user prompt.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Returns the sampling temperature.
    #[must_use]
    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Returns the output token budget.
    #[must_use]
    pub const fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    fn to_inference(&self) -> AdapterResult<InferenceRequest> {
        Ok(InferenceRequest::new(vec![PromptMessage::user(self.prompt.clone())])?
            .with_system_prompt(self.system.clone())
            .with_temperature(self.temperature)
            .with_max_output_tokens(self.max_output_tokens))
    }
}

/// Black-box "prompt in, text out" capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short label used in logs (provider/model, never the key).
    fn label(&self) -> &str;

    /// Generates text for the request.
    async fn generate_text(&self, request: &GenerationRequest) -> GenerationResult<String>;
}

/// [`TextGenerator`] backed by a [`ModelAdapter`] with a bounded call time.
///
/// Exceeding the bound is reported as a capacity failure.
pub struct AdapterGenerator {
    adapter: Arc<dyn ModelAdapter>,
    timeout: Duration,
    label: String,
}

impl fmt::Debug for AdapterGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterGenerator")
            .field("label", &self.label)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AdapterGenerator {
    /// Wraps an adapter with the supplied timeout.
    #[must_use]
    pub fn new(adapter: Arc<dyn ModelAdapter>, timeout: Duration) -> Self {
        let metadata = adapter.metadata();
        let label = format!("{}/{}", metadata.provider(), metadata.model());
        Self {
            adapter,
            timeout,
            label,
        }
    }
}

#[async_trait]
impl TextGenerator for AdapterGenerator {
    fn label(&self) -> &str {
        &self.label
    }

    async fn generate_text(&self, request: &GenerationRequest) -> GenerationResult<String> {
        let inference = request.to_inference()?;
        let call = async {
            let stream = self.adapter.infer(inference).await?;
            collect_text(stream).await
        };
        match timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(GenerationError::capacity(format!(
                "{} did not answer within {:?}",
                self.label, self.timeout
            ))),
        }
    }
}

/// Tries generators in order, moving on only after capacity failures.
pub struct FailoverGenerator {
    generators: Vec<Arc<dyn TextGenerator>>,
    label: String,
}

impl fmt::Debug for FailoverGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverGenerator")
            .field("label", &self.label)
            .field("generators", &self.generators.len())
            .finish()
    }
}

impl FailoverGenerator {
    /// Creates a failover chain. The first generator is the primary.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Generation`] when the list is empty.
    pub fn new(generators: Vec<Arc<dyn TextGenerator>>) -> GenerationResult<Self> {
        let Some(primary) = generators.first() else {
            return Err(GenerationError::generation(
                "failover requires at least one generator",
            ));
        };
        let label = format!("failover({})", primary.label());
        Ok(Self { generators, label })
    }

    /// Number of generators in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.generators.len()
    }

    /// Always false; construction rejects empty chains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

#[async_trait]
impl TextGenerator for FailoverGenerator {
    fn label(&self) -> &str {
        &self.label
    }

    async fn generate_text(&self, request: &GenerationRequest) -> GenerationResult<String> {
        let mut last_error = GenerationError::generation("no generator attempted");
        for (index, generator) in self.generators.iter().enumerate() {
            match generator.generate_text(request).await {
                Ok(text) => {
                    debug!(generator = generator.label(), attempt = index + 1, "generation succeeded");
                    return Ok(text);
                }
                Err(err) if err.is_capacity() => {
                    if index + 1 < self.generators.len() {
                        warn!(
                            generator = generator.label(),
                            error = %err,
                            "generation capacity exhausted, trying fallback credential"
                        );
                    }
                    last_error = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error)
    }
}

/// Builds one Gemini-backed generator per API key, in key order.
///
/// # Errors
///
/// Returns [`AdapterError::Configuration`] when no key is supplied or an
/// adapter cannot be constructed.
pub fn gemini_generators(
    api_keys: &[String],
    model: &str,
    call_timeout: Duration,
) -> AdapterResult<Vec<Arc<dyn TextGenerator>>> {
    if api_keys.is_empty() {
        return Err(AdapterError::configuration(
            "no Gemini API key configured (GOOGLE_API_KEY or GEMINI_API_KEY)",
        ));
    }
    api_keys
        .iter()
        .map(|key| {
            let adapter = GeminiAdapter::new(
                GeminiConfig::new(model)
                    .with_api_key(key.clone())
                    .with_timeout(call_timeout),
            )?;
            Ok(Arc::new(AdapterGenerator::new(Arc::new(adapter), call_timeout))
                as Arc<dyn TextGenerator>)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::stream;

    use super::*;
    use crate::traits::{AdapterMetadata, AdapterStream, InferenceChunk};

    struct Scripted {
        label: String,
        outcomes: Mutex<Vec<GenerationResult<String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(label: &str, outcomes: Vec<GenerationResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                label: label.to_owned(),
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn label(&self) -> &str {
            &self.label
        }

        async fn generate_text(&self, _request: &GenerationRequest) -> GenerationResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().unwrap().remove(0)
        }
    }

    struct SlowAdapter {
        metadata: AdapterMetadata,
    }

    #[async_trait]
    impl ModelAdapter for SlowAdapter {
        fn metadata(&self) -> &AdapterMetadata {
            &self.metadata
        }

        async fn infer(&self, _request: InferenceRequest) -> AdapterResult<AdapterStream> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Box::pin(stream::once(async {
                Ok(InferenceChunk::new("late", true))
            })))
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("system", "prompt")
    }

    #[tokio::test]
    async fn failover_moves_to_secondary_on_capacity() {
        let primary = Scripted::new("primary", vec![Err(GenerationError::capacity("429"))]);
        let secondary = Scripted::new("secondary", vec![Ok("def f(): ...".to_owned())]);
        let chain = FailoverGenerator::new(vec![primary.clone() as Arc<dyn TextGenerator>, secondary.clone()]).unwrap();

        let text = chain.generate_text(&request()).await.unwrap();
        assert_eq!(text, "def f(): ...");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failover_surfaces_capacity_when_all_exhausted() {
        let primary = Scripted::new("primary", vec![Err(GenerationError::capacity("429"))]);
        let secondary = Scripted::new("secondary", vec![Err(GenerationError::capacity("quota"))]);
        let chain = FailoverGenerator::new(vec![primary as Arc<dyn TextGenerator>, secondary]).unwrap();

        let err = chain.generate_text(&request()).await.unwrap_err();
        assert!(err.is_capacity());
    }

    #[tokio::test]
    async fn non_capacity_failures_are_not_retried() {
        let primary = Scripted::new("primary", vec![Err(GenerationError::generation("bad"))]);
        let secondary = Scripted::new("secondary", vec![Ok("unused".to_owned())]);
        let chain = FailoverGenerator::new(vec![primary as Arc<dyn TextGenerator>, secondary.clone()]).unwrap();

        let err = chain.generate_text(&request()).await.unwrap_err();
        assert!(!err.is_capacity());
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failover_rejects_empty_chain() {
        assert!(FailoverGenerator::new(Vec::new()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn adapter_timeout_counts_as_capacity() {
        let adapter = Arc::new(SlowAdapter {
            metadata: AdapterMetadata::new("test", "slow"),
        });
        let generator = AdapterGenerator::new(adapter, Duration::from_millis(50));
        let err = generator.generate_text(&request()).await.unwrap_err();
        assert!(err.is_capacity());
    }

    #[test]
    fn gemini_generators_require_keys() {
        assert!(gemini_generators(&[], "gemini-2.5-flash", Duration::from_secs(1)).is_err());
        let generators = gemini_generators(
            &["k1".to_owned(), "k2".to_owned()],
            "gemini-2.5-flash",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(generators.len(), 2);
        assert_eq!(generators[0].label(), "gemini/gemini-2.5-flash");
    }
}
