//! Error types for the catalog and its stores.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by catalog components.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing store could not be reached.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// Underlying I/O failure while reading or writing store files.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// A record with the same key already exists.
    #[error("`{key}` already exists in `{collection}`")]
    Conflict {
        /// Collection name.
        collection: String,
        /// Conflicting key.
        key: String,
    },
    /// A referenced record does not exist.
    #[error("`{key}` not found in `{collection}`")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Missing key.
        key: String,
    },
    /// Stored data or caller input failed validation.
    #[error("invalid record: {reason}")]
    InvalidRecord {
        /// Human-readable reason describing the failure.
        reason: String,
    },
}

impl CatalogError {
    /// Helper to construct unavailability errors.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Helper to construct validation errors.
    #[must_use]
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(collection: &str, key: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.to_owned(),
            key: key.into(),
        }
    }
}

impl From<agent_primitives::Error> for CatalogError {
    fn from(err: agent_primitives::Error) -> Self {
        Self::invalid_record(err.to_string())
    }
}

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
