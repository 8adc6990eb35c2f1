//! Credential resolution for synthesized tools.
//!
//! [`CredentialResolver`] answers, per credential name, whether a value is
//! available from an administrator record, the process environment or a
//! best-effort discovery step. It reports; it never fails.

#![warn(missing_docs, clippy::pedantic)]

mod directory;
mod environment;
mod requirements;
mod resolver;

pub use directory::{
    CredentialDirectory, DisabledDirectory, DiscoveryError, DiscoveryResult, GeneratorDirectory,
    parse_discovery,
};
pub use environment::{EnvironmentSource, ProcessEnvironment};
pub use requirements::credential_hints;
pub use resolver::{CredentialResolver, ResolutionReport, ResolutionSource, ResolvedCredential};
