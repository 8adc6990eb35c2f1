//! Configuration management for the tool foundry.
//!
//! Settings are read from process environment variables, optionally seeded
//! from a `.env` file. [`FoundryConfig::from_lookup`] takes an arbitrary
//! lookup function so tests never touch the real environment.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::EnvLookup;
pub use schema::{
    DiscoverySettings, ExecutionSettings, FoundryConfig, GenerationSettings, LogFormat,
    StorageSettings, SynthesisSettings, TelemetrySettings,
};
