//! Model adapters and the text generation contract used by the foundry.
//!
//! [`traits`] holds the provider-neutral adapter interface, [`gemini`] the
//! HTTPS implementation, and [`generation`] the single-shot
//! [`generation::TextGenerator`] consumed by synthesis, review and discovery.

#![warn(missing_docs, clippy::pedantic)]

pub mod gemini;
pub mod generation;
pub mod traits;

mod http_client;

pub use generation::{
    AdapterGenerator, FailoverGenerator, GenerationError, GenerationRequest, GenerationResult,
    TextGenerator, gemini_generators,
};
