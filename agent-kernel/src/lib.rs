//! Tool synthesis pipeline and guarded tool use.
//!
//! [`ToolFactory::create_tool`] turns a natural-language request into a
//! reviewed, catalogued artifact; [`ToolFactory::invoke_tool`] runs one with
//! credential scoping. [`TurnExecutor`] lets a model call an agent's tools
//! during a chat turn.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod factory;
mod observer;
mod synthesizer;
mod turn;

pub use error::{FactoryError, FactoryResult, InvokeError, InvokeResult, TurnError, TurnResult};
pub use factory::{
    CreateToolRequest, CreatedTool, DEFAULT_IDENTIFIER_MAX_LEN, DEFAULT_REVIEW_RETRIES,
    ToolFactory,
};
pub use observer::{CompositeReviewObserver, ReviewObserver, TracingReviewObserver};
pub use synthesizer::{CodeSynthesizer, strip_code_fences};
pub use turn::{DEFAULT_MAX_TOOL_ROUNDS, ToolCallRecord, TurnExecutor, TurnOutcome};
