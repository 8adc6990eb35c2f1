//! Credential resolution: admin record, then environment, then discovery.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use agent_catalog::{Catalog, CredentialRecord, CredentialSource};
use agent_primitives::CredentialName;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::directory::CredentialDirectory;
use crate::environment::EnvironmentSource;
use crate::requirements::credential_hints;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Administrator-registered record.
    Admin,
    /// Process environment default.
    Env,
    /// Found by discovery, now stored as a record.
    Discovered,
    /// Nothing supplied a value.
    Unsatisfied,
}

/// Outcome for one credential name.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    source: ResolutionSource,
    value: Option<String>,
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("source", &self.source)
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ResolvedCredential {
    fn found(source: ResolutionSource, value: String) -> Self {
        Self {
            source,
            value: Some(value),
        }
    }

    fn unsatisfied() -> Self {
        Self {
            source: ResolutionSource::Unsatisfied,
            value: None,
        }
    }

    /// Origin of the value.
    #[must_use]
    pub fn source(&self) -> ResolutionSource {
        self.source
    }

    /// Secret value, absent when unsatisfied.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns true when a value was found.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.value.is_some()
    }
}

/// Per-name resolution outcomes in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    entries: Vec<(CredentialName, ResolvedCredential)>,
}

impl ResolutionReport {
    /// Outcome for `name`, if it was requested.
    #[must_use]
    pub fn get(&self, name: &CredentialName) -> Option<&ResolvedCredential> {
        self.entries
            .iter()
            .find_map(|(entry, resolved)| (entry == name).then_some(resolved))
    }

    /// Iterates outcomes in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&CredentialName, &ResolvedCredential)> {
        self.entries.iter().map(|(name, resolved)| (name, resolved))
    }

    /// Number of distinct names resolved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true when every requested name has a value.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.entries.iter().all(|(_, resolved)| resolved.is_satisfied())
    }

    /// Names without a value, in request order.
    #[must_use]
    pub fn unsatisfied(&self) -> Vec<CredentialName> {
        self.entries
            .iter()
            .filter(|(_, resolved)| !resolved.is_satisfied())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names with a value, in request order.
    #[must_use]
    pub fn satisfied(&self) -> Vec<CredentialName> {
        self.entries
            .iter()
            .filter(|(_, resolved)| resolved.is_satisfied())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Values for every satisfied name.
    #[must_use]
    pub fn values(&self) -> BTreeMap<CredentialName, String> {
        self.entries
            .iter()
            .filter_map(|(name, resolved)| {
                resolved.value.clone().map(|value| (name.clone(), value))
            })
            .collect()
    }
}

/// Resolves credential names without ever failing.
///
/// Store and discovery failures are logged and the affected name falls
/// through to the next source, ending unsatisfied when nothing answers.
#[derive(Clone)]
pub struct CredentialResolver {
    catalog: Catalog,
    environment: Arc<dyn EnvironmentSource>,
    directory: Arc<dyn CredentialDirectory>,
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver").finish_non_exhaustive()
    }
}

impl CredentialResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(
        catalog: Catalog,
        environment: Arc<dyn EnvironmentSource>,
        directory: Arc<dyn CredentialDirectory>,
    ) -> Self {
        Self {
            catalog,
            environment,
            directory,
        }
    }

    /// Resolves each distinct name in `names`.
    ///
    /// `description` describes the requesting tool and guides discovery.
    pub async fn resolve(&self, names: &[CredentialName], description: &str) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        for name in names {
            if report.get(name).is_some() {
                continue;
            }
            let resolved = self.resolve_one(name, description).await;
            debug!(credential = %name, source = ?resolved.source(), "credential resolved");
            report.entries.push((name.clone(), resolved));
        }
        report
    }

    /// Optimistic pass over hints taken from a creation prompt.
    pub async fn resolve_hints(&self, prompt: &str) -> ResolutionReport {
        let records = self.catalog.credential_records().await;
        let hints = credential_hints(prompt, &records);
        if hints.is_empty() {
            return ResolutionReport::default();
        }
        self.resolve(&hints, prompt).await
    }

    async fn resolve_one(&self, name: &CredentialName, description: &str) -> ResolvedCredential {
        match self.catalog.credential(name).await {
            Ok(Some(record)) if !record.value().is_empty() => {
                let source = match record.source() {
                    CredentialSource::Admin => ResolutionSource::Admin,
                    CredentialSource::Discovered => ResolutionSource::Discovered,
                };
                return ResolvedCredential::found(source, record.value().to_owned());
            }
            Ok(_) => {}
            Err(err) => {
                warn!(credential = %name, error = %err, "credential store lookup failed");
            }
        }

        if let Some(value) = self.environment.var(name.as_str()) {
            return ResolvedCredential::found(ResolutionSource::Env, value);
        }

        match self.directory.discover(name, description).await {
            Ok(Some(value)) => {
                self.remember(name, &value, description).await;
                ResolvedCredential::found(ResolutionSource::Discovered, value)
            }
            Ok(None) => ResolvedCredential::unsatisfied(),
            Err(err) => {
                warn!(credential = %name, error = %err, "credential discovery failed");
                ResolvedCredential::unsatisfied()
            }
        }
    }

    async fn remember(&self, name: &CredentialName, value: &str, description: &str) {
        let record = CredentialRecord::new(
            name.clone(),
            value,
            format!("Discovered for: {description}"),
            CredentialSource::Discovered,
        );
        match self.catalog.insert_credential(&record).await {
            Ok(true) => info!(credential = %name, "discovered credential stored"),
            Ok(false) => debug!(credential = %name, "credential registered concurrently"),
            Err(err) => {
                warn!(credential = %name, error = %err, "discovered credential not stored");
            }
        }
    }
}
