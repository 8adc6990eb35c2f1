//! Credential scoping for tool invocations.

use std::collections::BTreeMap;
use std::fmt;

use agent_primitives::CredentialName;

/// Credentials visible to one invocation, keyed by declared name.
///
/// Each call gets its own scope and runtimes build the tool's environment
/// from it alone, so nothing shared is mutated and nothing needs restoring.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialScope {
    values: BTreeMap<CredentialName, String>,
}

impl fmt::Debug for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialScope")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl From<BTreeMap<CredentialName, String>> for CredentialScope {
    fn from(values: BTreeMap<CredentialName, String>) -> Self {
        Self { values }
    }
}

impl CredentialScope {
    /// Scope without credentials.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find_map(|(key, value)| (key.as_str() == name).then_some(value.as_str()))
    }

    /// Names in scope, ordered.
    pub fn names(&self) -> impl Iterator<Item = &CredentialName> {
        self.values.keys()
    }

    /// Iterates `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&CredentialName, &str)> {
        self.values.iter().map(|(name, value)| (name, value.as_str()))
    }

    /// Returns true when nothing is in scope.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
