//! Catalog of agents, tool artifacts and credentials.
//!
//! Two collaborators sit underneath: a [`DocumentStore`] for JSON records and
//! a write-once [`FileStore`] for artifact source. [`Catalog`] gives them a
//! typed face, and [`ArtifactPersister`] turns a reviewed candidate into a
//! catalogued artifact with a collision-free identifier.

#![warn(missing_docs, clippy::pedantic)]

mod catalog;
mod error;
mod files;
mod identity;
mod persist;
mod records;
mod store;

pub use catalog::{AGENTS, CREDENTIALS, Catalog, TOOLS};
pub use error::{CatalogError, CatalogResult};
pub use files::{FileStore, LocalFileStore, MemoryFileStore};
pub use identity::{
    FALLBACK_DESCRIBED_IDENTIFIER, FALLBACK_IDENTIFIER, candidates, derive_from_description,
    sanitize_name_hint,
};
pub use persist::{ArtifactPersister, NewArtifact, PersistedArtifact};
pub use records::{CredentialRecord, CredentialSource, CredentialSummary, ToolRecord};
pub use store::{DocumentStore, FileDocumentStore, MemoryDocumentStore};
