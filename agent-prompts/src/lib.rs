//! Prompt texts and templating for the foundry.

#![warn(missing_docs, clippy::pedantic)]

pub mod library;
pub mod template;

pub use library::PromptLibrary;
pub use template::{PromptTemplate, TemplateError, TemplateResult};
