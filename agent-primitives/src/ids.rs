//! Identifier types for agents, tools and credentials.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

const MAX_TOOL_ID_LEN: usize = 96;
const MAX_CREDENTIAL_NAME_LEN: usize = 128;

/// Unique identifier for a configured agent.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(Uuid);

impl AgentId {
    /// Generates a random agent identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::random()
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for AgentId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for AgentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(Error::from)?;
        Ok(Self::from_uuid(uuid))
    }
}

/// Stable, filesystem-safe identifier of a persisted tool artifact.
///
/// Only lowercase ASCII letters, digits and underscores are accepted, which
/// keeps the identifier usable as a file stem and a URL path segment.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolId(String);

impl ToolId {
    /// Creates a tool identifier after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToolId`] if the identifier is empty, too long,
    /// or contains characters outside `[a-z0-9_]`.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidToolId {
                id,
                reason: "identifier cannot be empty".into(),
            });
        }
        if id.len() > MAX_TOOL_ID_LEN {
            return Err(Error::InvalidToolId {
                id,
                reason: format!("identifier length must be <= {MAX_TOOL_ID_LEN}"),
            });
        }
        if !id
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
        {
            return Err(Error::InvalidToolId {
                id,
                reason: "identifier must contain lowercase alphanumeric or underscore".into(),
            });
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ToolId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ToolId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ToolId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ToolId> for String {
    fn from(value: ToolId) -> Self {
        value.0
    }
}

/// Exact name a tool uses to read one credential, e.g. `WEATHER_KEY`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialName(String);

impl CredentialName {
    /// Creates a credential name, requiring the shape of an environment key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentialName`] unless the name matches
    /// `[A-Za-z_][A-Za-z0-9_]*` and fits the length limit.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_head = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_head || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidCredentialName {
                name,
                reason: "name must match [A-Za-z_][A-Za-z0-9_]*".into(),
            });
        }
        if name.len() > MAX_CREDENTIAL_NAME_LEN {
            return Err(Error::InvalidCredentialName {
                name,
                reason: format!("name length must be <= {MAX_CREDENTIAL_NAME_LEN}"),
            });
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CredentialName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CredentialName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CredentialName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CredentialName> for String {
    fn from(value: CredentialName) -> Self {
        value.0
    }
}

impl AsRef<str> for CredentialName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_agent_id() {
        let id = AgentId::random();
        let parsed = id.to_string().parse::<AgentId>().expect("parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn tool_id_rejects_unsafe_characters() {
        assert!(ToolId::new("bitcoin_price_2").is_ok());
        for bad in ["", "Bitcoin", "../etc", "price-usd", "a b"] {
            let err = ToolId::new(bad).expect_err("should reject");
            assert!(matches!(err, Error::InvalidToolId { .. }), "{bad}");
        }
    }

    #[test]
    fn credential_name_requires_env_shape() {
        assert!(CredentialName::new("WEATHER_KEY").is_ok());
        assert!(CredentialName::new("_private").is_ok());
        for bad in ["", "1KEY", "MY KEY", "KEY-2", "*"] {
            assert!(CredentialName::new(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn tool_id_deserialization_validates() {
        let ok: ToolId = serde_json::from_str("\"weather\"").unwrap();
        assert_eq!(ok.as_str(), "weather");
        assert!(serde_json::from_str::<ToolId>("\"../x\"").is_err());
    }
}
