//! Shared error definitions for foundry primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the foundry.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided agent identifier could not be parsed.
    #[error("invalid agent id: {source}")]
    InvalidAgentId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Tool identifier failed validation.
    #[error("invalid tool id `{id}`: {reason}")]
    InvalidToolId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Credential name failed validation.
    #[error("invalid credential name `{name}`: {reason}")]
    InvalidCredentialName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Agent profile failed validation.
    #[error("invalid agent profile: {reason}")]
    InvalidAgent {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
