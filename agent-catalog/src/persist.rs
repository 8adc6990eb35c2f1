//! Collision-free persistence of reviewed artifacts.

use agent_policy::SafetyVerdict;
use agent_primitives::{AgentId, CredentialName, ToolId};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::identity::{candidates, derive_from_description, sanitize_name_hint};
use crate::records::ToolRecord;
use crate::{CatalogError, CatalogResult};

const MAX_SUFFIX_ATTEMPTS: usize = 10_000;

/// A reviewed artifact waiting for an identity.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    /// Caller-supplied name hint; derived from the description when absent.
    pub name_hint: Option<String>,
    /// Natural-language description.
    pub description: String,
    /// Source code that passed review.
    pub source: String,
    /// Declared credential names.
    pub credentials: Vec<CredentialName>,
    /// Agent to link the artifact to.
    pub owner: Option<AgentId>,
    /// Passing verdict.
    pub verdict: SafetyVerdict,
}

/// Outcome of a successful persist.
#[derive(Debug, Clone)]
pub struct PersistedArtifact {
    /// Stored record.
    pub record: ToolRecord,
    /// Whether the owner link was written.
    pub linked: bool,
}

/// Derives identifiers and writes artifacts: file first, then record, then
/// the optional owner link.
#[derive(Debug, Clone)]
pub struct ArtifactPersister {
    catalog: Catalog,
    max_len: usize,
}

impl ArtifactPersister {
    /// Creates a persister truncating identifier bases to `max_len`.
    #[must_use]
    pub fn new(catalog: Catalog, max_len: usize) -> Self {
        Self { catalog, max_len }
    }

    /// Identifier base for an artifact before collision handling.
    #[must_use]
    pub fn base_identifier(&self, name_hint: Option<&str>, description: &str) -> String {
        match name_hint.filter(|hint| !hint.trim().is_empty()) {
            Some(hint) => sanitize_name_hint(hint, self.max_len),
            None => derive_from_description(description, self.max_len),
        }
    }

    /// Persists the artifact under a fresh identifier.
    ///
    /// Never overwrites: an identifier is taken only when the catalog has
    /// no record for it and the file store creates it exclusively. A record
    /// write failure after the file write leaves an orphaned file, which
    /// catalog-first lookups ignore. A link failure is logged and reported
    /// through [`PersistedArtifact::linked`].
    ///
    /// # Errors
    ///
    /// Propagates store failures before the record is written.
    pub async fn persist(&self, artifact: NewArtifact) -> CatalogResult<PersistedArtifact> {
        if artifact.verdict.kind() != agent_policy::VerdictKind::Safe {
            return Err(CatalogError::invalid_record(
                "only artifacts with a passing verdict are persisted",
            ));
        }

        let base = self.base_identifier(artifact.name_hint.as_deref(), &artifact.description);
        let id = self.claim(&base, &artifact.source).await?;

        let record = ToolRecord::new(
            id.clone(),
            artifact.description,
            self.catalog.files().file_name(&id),
            artifact.credentials,
            artifact.owner,
            artifact.verdict,
        );
        if let Err(err) = self.catalog.insert_tool(&record).await {
            warn!(tool = %id, error = %err, "catalog write failed; source file left orphaned");
            return Err(err);
        }
        info!(tool = %id, credentials = record.credentials().len(), "artifact persisted");

        let linked = match artifact.owner {
            Some(owner) => match self.catalog.link_tool(owner, &id).await {
                Ok(_) => true,
                Err(err) => {
                    warn!(tool = %id, agent = %owner, error = %err, "artifact left unlinked");
                    false
                }
            },
            None => false,
        };

        Ok(PersistedArtifact { record, linked })
    }

    async fn claim(&self, base: &str, source: &str) -> CatalogResult<ToolId> {
        for candidate in candidates(base).take(MAX_SUFFIX_ATTEMPTS) {
            let id = ToolId::new(candidate)?;
            if self.catalog.tool(&id).await?.is_some() {
                continue;
            }
            if self.catalog.files().create(&id, source).await? {
                return Ok(id);
            }
        }
        Err(CatalogError::Conflict {
            collection: crate::catalog::TOOLS.to_owned(),
            key: base.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::files::{FileStore, LocalFileStore, MemoryFileStore};
    use crate::store::{DocumentStore, FileDocumentStore, MemoryDocumentStore};

    fn artifact(hint: Option<&str>, source: &str) -> NewArtifact {
        NewArtifact {
            name_hint: hint.map(str::to_owned),
            description: "Fetch the weather".to_owned(),
            source: source.to_owned(),
            credentials: vec![CredentialName::new("WEATHER_KEY").unwrap()],
            owner: None,
            verdict: SafetyVerdict::safe(),
        }
    }

    fn persister() -> (ArtifactPersister, Catalog) {
        let catalog = Catalog::new(
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(MemoryFileStore::new()),
        );
        (ArtifactPersister::new(catalog.clone(), 40), catalog)
    }

    #[tokio::test]
    async fn colliding_hints_get_distinct_identifiers() {
        let (persister, catalog) = persister();
        let first = persister.persist(artifact(Some("Weather"), "one")).await.unwrap();
        let second = persister.persist(artifact(Some("weather"), "two")).await.unwrap();
        let third = persister.persist(artifact(Some("WEATHER"), "three")).await.unwrap();

        let ids = [
            first.record.id().as_str(),
            second.record.id().as_str(),
            third.record.id().as_str(),
        ];
        assert_eq!(ids, ["weather", "weather_1", "weather_2"]);
        assert_eq!(
            catalog.tool_source(first.record.id()).await.unwrap().as_deref(),
            Some("one")
        );
        assert_eq!(
            catalog.tool_source(second.record.id()).await.unwrap().as_deref(),
            Some("two")
        );
    }

    #[tokio::test]
    async fn concurrent_persists_never_share_an_identifier() {
        let (persister, catalog) = persister();
        let (a, b) = tokio::join!(
            persister.persist(artifact(Some("race"), "a")),
            persister.persist(artifact(Some("race"), "b")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.record.id(), b.record.id());
        let sources = [
            catalog.tool_source(a.record.id()).await.unwrap().unwrap(),
            catalog.tool_source(b.record.id()).await.unwrap().unwrap(),
        ];
        assert!(sources.contains(&"a".to_owned()) && sources.contains(&"b".to_owned()));
    }

    #[tokio::test]
    async fn orphaned_files_are_skipped_by_identity() {
        let (persister, catalog) = persister();
        catalog
            .files()
            .create(&ToolId::new("weather").unwrap(), "orphan")
            .await
            .unwrap();
        let persisted = persister.persist(artifact(Some("weather"), "new")).await.unwrap();
        assert_eq!(persisted.record.id().as_str(), "weather_1");
    }

    #[tokio::test]
    async fn missing_hint_uses_description() {
        let (persister, _) = persister();
        let persisted = persister.persist(artifact(Some("  "), "x")).await.unwrap();
        assert_eq!(persisted.record.id().as_str(), "tool_fetch_the_weather");
        assert_eq!(persisted.record.file_name(), "tool_fetch_the_weather.py");
    }

    #[tokio::test]
    async fn link_failure_keeps_the_artifact() {
        let (persister, catalog) = persister();
        let mut request = artifact(Some("weather"), "x");
        request.owner = Some(AgentId::random());
        let persisted = persister.persist(request).await.unwrap();
        assert!(!persisted.linked);
        assert!(catalog.tool(persisted.record.id()).await.unwrap().is_some());

        let agent = catalog.ensure_default_agent().await.unwrap();
        let mut request = artifact(Some("weather"), "y");
        request.owner = Some(agent.id());
        let persisted = persister.persist(request).await.unwrap();
        assert!(persisted.linked);
        let agent = catalog.agent(agent.id()).await.unwrap().unwrap();
        assert_eq!(agent.tools(), [persisted.record.id().clone()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_persists_for_one_owner_keep_every_link() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(
            Arc::new(FileDocumentStore::open(dir.path().join("data")).await.unwrap()),
            Arc::new(LocalFileStore::open(dir.path().join("tools")).await.unwrap()),
        );
        let persister = ArtifactPersister::new(catalog.clone(), 40);
        let owner = catalog.ensure_default_agent().await.unwrap().id();

        let tasks: Vec<_> = (0..16)
            .map(|n| {
                let persister = persister.clone();
                let mut request = artifact(Some("weather"), &format!("source {n}"));
                request.owner = Some(owner);
                tokio::spawn(async move { persister.persist(request).await })
            })
            .collect();
        let mut ids = Vec::new();
        for task in tasks {
            let persisted = task.await.unwrap().unwrap();
            assert!(persisted.linked);
            ids.push(persisted.record.id().clone());
        }

        let agent = catalog.agent(owner).await.unwrap().unwrap();
        let mut linked = agent.tools().to_vec();
        linked.sort();
        ids.sort();
        assert_eq!(linked, ids);
        assert_eq!(catalog.list_tools().await.len(), 16);
    }

    #[tokio::test]
    async fn unsafe_verdicts_are_refused() {
        let (persister, catalog) = persister();
        let mut request = artifact(Some("weather"), "x");
        request.verdict = SafetyVerdict::unsafe_with(["nope"]);
        assert!(persister.persist(request).await.is_err());
        assert!(catalog.browse_tool_files().await.unwrap().is_empty());
    }

    struct RejectToolInserts(MemoryDocumentStore);

    #[async_trait]
    impl DocumentStore for RejectToolInserts {
        async fn ping(&self) -> CatalogResult<()> {
            self.0.ping().await
        }
        async fn insert(&self, collection: &str, key: &str, document: Value) -> CatalogResult<()> {
            if collection == crate::catalog::TOOLS {
                return Err(CatalogError::unavailable("write refused"));
            }
            self.0.insert(collection, key, document).await
        }
        async fn put(&self, collection: &str, key: &str, document: Value) -> CatalogResult<()> {
            self.0.put(collection, key, document).await
        }
        async fn get(&self, collection: &str, key: &str) -> CatalogResult<Option<Value>> {
            self.0.get(collection, key).await
        }
        async fn delete(&self, collection: &str, key: &str) -> CatalogResult<bool> {
            self.0.delete(collection, key).await
        }
        async fn list(&self, collection: &str) -> CatalogResult<Vec<Value>> {
            self.0.list(collection).await
        }
    }

    #[tokio::test]
    async fn record_failure_surfaces_and_leaves_only_a_file() {
        let files = Arc::new(MemoryFileStore::new());
        let catalog = Catalog::new(
            Arc::new(RejectToolInserts(MemoryDocumentStore::new())),
            files.clone(),
        );
        let persister = ArtifactPersister::new(catalog.clone(), 40);
        let err = persister
            .persist(artifact(Some("weather"), "x"))
            .await
            .expect_err("record write fails");
        assert!(matches!(err, CatalogError::Unavailable { .. }));
        assert!(catalog.list_tools().await.is_empty());
        assert_eq!(files.list().await.unwrap().len(), 1);
    }
}
