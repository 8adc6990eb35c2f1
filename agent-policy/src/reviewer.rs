//! Safety reviewers for synthesized tool code.

use std::sync::Arc;

use agent_adapters::{GenerationError, GenerationRequest, TextGenerator};
use agent_prompts::{PromptLibrary, TemplateError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::scanner::analyze;
use crate::verdict::SafetyVerdict;

const REVIEW_TEMPERATURE: f32 = 0.0;
const REVIEW_MAX_TOKENS: u32 = 256;
const UNCONFIRMED: &str = "classifier did not confirm the code is safe";

/// Errors surfaced by reviewers.
///
/// An unsafe verdict is not an error; these cover failures to reach one.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The classifier call failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// The review prompt could not be rendered.
    #[error("review prompt failed: {0}")]
    Prompt(#[from] TemplateError),
}

impl ReviewError {
    /// True when the underlying generation capability is exhausted.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::Generation(err) if err.is_capacity())
    }
}

/// Result alias for review operations.
pub type ReviewResult<T> = Result<T, ReviewError>;

/// Trait implemented by safety reviewers.
#[async_trait]
pub trait SafetyReviewer: Send + Sync {
    /// Classifies `code` as safe or unsafe.
    async fn review(&self, code: &str) -> ReviewResult<SafetyVerdict>;
}

/// Deterministic reviewer backed by the static scanner.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticReviewer;

#[async_trait]
impl SafetyReviewer for StaticReviewer {
    async fn review(&self, code: &str) -> ReviewResult<SafetyVerdict> {
        let analysis = analyze(code);
        if analysis.is_clean() {
            Ok(SafetyVerdict::safe())
        } else {
            debug!(findings = analysis.findings().len(), "static scan rejected candidate");
            Ok(SafetyVerdict::unsafe_with(analysis.reasons()))
        }
    }
}

/// Reviewer that asks the generation capability to classify the code.
pub struct ClassifierReviewer {
    generator: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLibrary>,
}

impl ClassifierReviewer {
    /// Creates a classifier reviewer.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: Arc<PromptLibrary>) -> Self {
        Self { generator, prompts }
    }
}

impl std::fmt::Debug for ClassifierReviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierReviewer")
            .field("generator", &self.generator.label())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SafetyReviewer for ClassifierReviewer {
    async fn review(&self, code: &str) -> ReviewResult<SafetyVerdict> {
        let request = GenerationRequest::new(
            self.prompts.review_system.clone(),
            self.prompts.review(code)?,
        )
        .with_temperature(REVIEW_TEMPERATURE)
        .with_max_output_tokens(REVIEW_MAX_TOKENS);

        let reply = self.generator.generate_text(&request).await?;
        Ok(parse_classification(&reply))
    }
}

/// Interprets a classifier reply.
///
/// Only a reply whose first word is `SAFE` passes. `UNSAFE:` reasons are
/// split on `;`; anything else counts as unconfirmed.
#[must_use]
pub fn parse_classification(reply: &str) -> SafetyVerdict {
    let reply = reply.trim().trim_matches('`').trim();
    let first_word = reply
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();

    if first_word.eq_ignore_ascii_case("safe") {
        return SafetyVerdict::safe();
    }
    if first_word.eq_ignore_ascii_case("unsafe") {
        let rest = reply[first_word.len()..].trim_start_matches([':', ' ', '-']);
        let reasons = rest
            .split([';', '\n'])
            .map(|reason| reason.trim().trim_start_matches('-').trim())
            .filter(|reason| !reason.is_empty())
            .map(|reason| format!("classifier: {reason}"));
        return SafetyVerdict::unsafe_with(reasons);
    }
    SafetyVerdict::unsafe_with([UNCONFIRMED])
}

/// Runs the static scan and the classifier and fails closed.
///
/// The static scan always runs, so a misbehaving classifier can add
/// rejections but never remove them. When the scan already rejects the
/// code the classifier is still consulted so its reasons reach the next
/// synthesis attempt.
pub struct GatedReviewer {
    static_reviewer: StaticReviewer,
    classifier: Arc<dyn SafetyReviewer>,
}

impl GatedReviewer {
    /// Combines the static scanner with `classifier`.
    #[must_use]
    pub fn new(classifier: Arc<dyn SafetyReviewer>) -> Self {
        Self {
            static_reviewer: StaticReviewer,
            classifier,
        }
    }
}

impl std::fmt::Debug for GatedReviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatedReviewer").finish_non_exhaustive()
    }
}

#[async_trait]
impl SafetyReviewer for GatedReviewer {
    async fn review(&self, code: &str) -> ReviewResult<SafetyVerdict> {
        let scanned = self.static_reviewer.review(code).await?;
        let classified = self.classifier.review(code).await?;
        Ok(scanned.or(classified))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    const CLEAN: &str = "import requests\n\n\ndef price() -> dict:\n    \"\"\"Price.\"\"\"\n    return requests.get('https://example.com', timeout=5).json()\n";
    const LEAKY: &str = "import os\n\n\ndef leak() -> dict:\n    \"\"\"Leak.\"\"\"\n    return dict(os.environ)\n";

    struct Replies {
        replies: Mutex<Vec<Result<String, GenerationError>>>,
        prompts: Mutex<Vec<GenerationRequest>>,
    }

    impl Replies {
        fn new(replies: Vec<Result<String, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Replies {
        fn label(&self) -> &str {
            "replies"
        }

        async fn generate_text(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            self.prompts.lock().unwrap().push(request.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn classifier(replies: &Arc<Replies>) -> Arc<ClassifierReviewer> {
        Arc::new(ClassifierReviewer::new(
            replies.clone(),
            Arc::new(PromptLibrary::default()),
        ))
    }

    #[test]
    fn classification_replies_are_parsed() {
        assert!(parse_classification("SAFE").is_safe());
        assert!(parse_classification("  safe.\n").is_safe());
        assert!(!parse_classification("SAFETY CONCERNS").is_safe());

        let verdict = parse_classification("UNSAFE: reads files; spawns a shell");
        assert_eq!(
            verdict.reasons(),
            ["classifier: reads files", "classifier: spawns a shell"]
        );

        let verdict = parse_classification("I think this is fine");
        assert_eq!(verdict.reasons(), [UNCONFIRMED]);
    }

    #[tokio::test]
    async fn classifier_uses_deterministic_sampling() {
        let replies = Replies::new(vec![Ok("SAFE".into())]);
        let verdict = classifier(&replies).review(CLEAN).await.unwrap();
        assert!(verdict.is_safe());

        let prompts = replies.prompts.lock().unwrap();
        assert_eq!(prompts[0].max_output_tokens(), REVIEW_MAX_TOKENS);
        assert!(prompts[0].temperature().abs() < f32::EPSILON);
        assert!(prompts[0].prompt().contains("def price()"));
    }

    #[tokio::test]
    async fn static_scan_overrides_a_permissive_classifier() {
        let replies = Replies::new(vec![Ok("SAFE".into())]);
        let gated = GatedReviewer::new(classifier(&replies));
        let verdict = gated.review(LEAKY).await.unwrap();
        assert!(!verdict.is_safe());
        assert!(verdict.reasons()[0].contains("raw environment enumeration"));
    }

    #[tokio::test]
    async fn classifier_rejection_alone_is_enough() {
        let replies = Replies::new(vec![Ok("UNSAFE: exfiltrates data".into())]);
        let gated = GatedReviewer::new(classifier(&replies));
        let verdict = gated.review(CLEAN).await.unwrap();
        assert_eq!(verdict.reasons(), ["classifier: exfiltrates data"]);
    }

    #[tokio::test]
    async fn capacity_failures_propagate() {
        let replies = Replies::new(vec![Err(GenerationError::capacity("429"))]);
        let err = GatedReviewer::new(classifier(&replies))
            .review(CLEAN)
            .await
            .expect_err("capacity");
        assert!(err.is_capacity());
    }
}
