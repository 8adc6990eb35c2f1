//! Records stored in the catalog collections.

use std::fmt;

use agent_policy::SafetyVerdict;
use agent_primitives::{AgentId, CredentialName, ToolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog metadata for one persisted artifact.
///
/// The source itself lives in the file store under [`ToolRecord::file_name`].
/// Records are never mutated after creation; a revision is a new artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    id: ToolId,
    name: String,
    description: String,
    file_name: String,
    #[serde(default)]
    credentials: Vec<CredentialName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<AgentId>,
    created_at: DateTime<Utc>,
    verdict: SafetyVerdict,
}

impl ToolRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(
        id: ToolId,
        description: impl Into<String>,
        file_name: impl Into<String>,
        credentials: Vec<CredentialName>,
        owner: Option<AgentId>,
        verdict: SafetyVerdict,
    ) -> Self {
        Self {
            name: id.to_string(),
            id,
            description: description.into(),
            file_name: file_name.into(),
            credentials,
            owner,
            created_at: Utc::now(),
            verdict,
        }
    }

    /// Stable identifier.
    #[must_use]
    pub fn id(&self) -> &ToolId {
        &self.id
    }

    /// Human name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Natural-language description the artifact was created from.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// File name in the source store.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Declared credential names in source order.
    #[must_use]
    pub fn credentials(&self) -> &[CredentialName] {
        &self.credentials
    }

    /// Agent the artifact was created for.
    #[must_use]
    pub fn owner(&self) -> Option<AgentId> {
        self.owner
    }

    /// Creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Review verdict recorded at persistence time.
    #[must_use]
    pub fn verdict(&self) -> &SafetyVerdict {
        &self.verdict
    }
}

/// Where a credential record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Registered by an administrator.
    Admin,
    /// Found by public-key discovery.
    Discovered,
}

/// Named secret available to tools.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    name: CredentialName,
    value: String,
    #[serde(default)]
    description: String,
    source: CredentialSource,
    created_at: DateTime<Utc>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("name", &self.name)
            .field("value", &self.masked())
            .field("description", &self.description)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl CredentialRecord {
    /// Creates a record; value and description are trimmed.
    #[must_use]
    pub fn new(
        name: CredentialName,
        value: impl AsRef<str>,
        description: impl AsRef<str>,
        source: CredentialSource,
    ) -> Self {
        Self {
            name,
            value: value.as_ref().trim().to_owned(),
            description: description.as_ref().trim().to_owned(),
            source,
            created_at: Utc::now(),
        }
    }

    /// Credential name.
    #[must_use]
    pub fn name(&self) -> &CredentialName {
        &self.name
    }

    /// Secret value. Only the execution path reads this.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Human description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Record origin.
    #[must_use]
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Display form: `****` followed by the last four characters when the
    /// value is longer than four characters.
    #[must_use]
    pub fn masked(&self) -> String {
        let count = self.value.chars().count();
        if count > 4 {
            let tail: String = self.value.chars().skip(count - 4).collect();
            format!("****{tail}")
        } else {
            "****".to_owned()
        }
    }

    /// Read-path view without the value.
    #[must_use]
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            name: self.name.clone(),
            masked_value: self.masked(),
            description: self.description.clone(),
            source: self.source,
            created_at: self.created_at,
        }
    }
}

/// Credential as shown to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    /// Credential name.
    pub name: CredentialName,
    /// Masked value.
    pub masked_value: String,
    /// Human description.
    pub description: String,
    /// Record origin.
    pub source: CredentialSource,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: &str) -> CredentialRecord {
        CredentialRecord::new(
            CredentialName::new("WEATHER_KEY").unwrap(),
            value,
            " weather api ",
            CredentialSource::Admin,
        )
    }

    #[test]
    fn masking_keeps_last_four() {
        assert_eq!(record(" abcdef123456 ").masked(), "****3456");
        assert_eq!(record("1234").masked(), "****");
        assert_eq!(record("").masked(), "****");
    }

    #[test]
    fn debug_and_summary_never_show_the_value() {
        let record = record("supersecretvalue");
        let debug = format!("{record:?}");
        assert!(!debug.contains("supersecret"));
        let summary = record.summary();
        assert_eq!(summary.masked_value, "****alue");
        assert_eq!(summary.description, "weather api");
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("supersecret"));
    }

    #[test]
    fn tool_record_defaults_name_to_id() {
        let record = ToolRecord::new(
            ToolId::new("btc_price").unwrap(),
            "bitcoin price",
            "btc_price.py",
            Vec::new(),
            None,
            SafetyVerdict::safe(),
        );
        assert_eq!(record.name(), "btc_price");
        assert!(record.verdict().is_safe());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("owner").is_none());
    }
}
