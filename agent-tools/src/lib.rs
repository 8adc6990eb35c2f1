//! Loading and guarded execution of persisted tool artifacts.
//!
//! [`ToolLoader`] turns catalog records into [`ToolHandle`]s backed by a
//! [`ToolRuntime`]. [`ExecutionGuard`] resolves a tool's declared
//! credentials and hands exactly those to the call as a private
//! [`CredentialScope`]; the runtime builds the tool's environment from that
//! scope alone.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod guard;
pub mod loader;
pub mod registry;
pub mod runtime;
pub mod scope;

pub use error::{ToolError, ToolResult};
pub use guard::{ExecutionGuard, InvocationOutcome};
pub use loader::{LoadedToolset, ToolLoader};
pub use registry::{Tool, ToolHandle, ToolMetadata, ToolRegistry};
pub use runtime::{ArtifactProgram, PythonRuntime, ToolRuntime};
pub use scope::CredentialScope;
