//! Key-namespaced document stores.
//!
//! A [`DocumentStore`] holds JSON documents grouped in collections and keyed
//! by a short identifier. The catalog owns the schema; stores only move
//! values around.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::{CatalogError, CatalogResult};

/// Trait implemented by document stores.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Checks connectivity.
    async fn ping(&self) -> CatalogResult<()>;

    /// Inserts a document, failing with [`CatalogError::Conflict`] when the key
    /// is taken.
    async fn insert(&self, collection: &str, key: &str, document: Value) -> CatalogResult<()>;

    /// Inserts or replaces a document.
    async fn put(&self, collection: &str, key: &str, document: Value) -> CatalogResult<()>;

    /// Fetches one document.
    async fn get(&self, collection: &str, key: &str) -> CatalogResult<Option<Value>>;

    /// Removes a document, returning whether it existed.
    async fn delete(&self, collection: &str, key: &str) -> CatalogResult<bool>;

    /// Returns every document in the collection ordered by key.
    async fn list(&self, collection: &str) -> CatalogResult<Vec<Value>>;
}

/// In-process store used by tests and ephemeral deployments.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Value>>>,
    available: AtomicBool,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates losing or regaining connectivity.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> CatalogResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CatalogError::unavailable("memory store is offline"))
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ping(&self) -> CatalogResult<()> {
        self.check()
    }

    async fn insert(&self, collection: &str, key: &str, document: Value) -> CatalogResult<()> {
        self.check()?;
        let mut guard = self.collections.write().await;
        let documents = guard.entry(collection.to_owned()).or_default();
        if documents.contains_key(key) {
            return Err(CatalogError::Conflict {
                collection: collection.to_owned(),
                key: key.to_owned(),
            });
        }
        documents.insert(key.to_owned(), document);
        Ok(())
    }

    async fn put(&self, collection: &str, key: &str, document: Value) -> CatalogResult<()> {
        self.check()?;
        self.collections
            .write()
            .await
            .entry(collection.to_owned())
            .or_default()
            .insert(key.to_owned(), document);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> CatalogResult<Option<Value>> {
        self.check()?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|documents| documents.get(key))
            .cloned())
    }

    async fn delete(&self, collection: &str, key: &str) -> CatalogResult<bool> {
        self.check()?;
        Ok(self
            .collections
            .write()
            .await
            .get_mut(collection)
            .is_some_and(|documents| documents.remove(key).is_some()))
    }

    async fn list(&self, collection: &str) -> CatalogResult<Vec<Value>> {
        self.check()?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// File-backed store writing one JSON file per document under
/// `root/<collection>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    /// Opens (or creates) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors raised while creating the directory.
    pub async fn open(root: impl Into<PathBuf>) -> CatalogResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> CatalogResult<PathBuf> {
        validate_segment(collection)?;
        Ok(self.root.join(collection))
    }

    fn document_path(&self, collection: &str, key: &str) -> CatalogResult<PathBuf> {
        validate_segment(key)?;
        Ok(self.collection_dir(collection)?.join(format!("{key}.json")))
    }

    /// Writes `document` to a fresh staging file next to its final path.
    ///
    /// Staging names never end in `.json`, so listings skip them.
    async fn stage(&self, collection: &str, key: &str, document: &Value) -> CatalogResult<PathBuf> {
        let dir = self.collection_dir(collection)?;
        fs::create_dir_all(&dir).await?;
        let staging = dir.join(format!("{key}.{}.tmp", Uuid::new_v4().simple()));
        fs::write(&staging, serde_json::to_vec_pretty(document)?).await?;
        Ok(staging)
    }
}

fn validate_segment(segment: &str) -> CatalogResult<()> {
    let valid = !segment.is_empty()
        && segment
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(CatalogError::invalid_record(format!(
            "`{segment}` is not a valid store key"
        )))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn ping(&self) -> CatalogResult<()> {
        let metadata = fs::metadata(&self.root)
            .await
            .map_err(|err| CatalogError::unavailable(format!("{}: {err}", self.root.display())))?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(CatalogError::unavailable(format!(
                "{} is not a directory",
                self.root.display()
            )))
        }
    }

    async fn insert(&self, collection: &str, key: &str, document: Value) -> CatalogResult<()> {
        let path = self.document_path(collection, key)?;
        let staging = self.stage(collection, key, &document).await?;
        // The final path only ever appears fully written.
        let linked = fs::hard_link(&staging, &path).await;
        if let Err(err) = fs::remove_file(&staging).await {
            warn!(path = %staging.display(), error = %err, "staging file left behind");
        }
        match linked {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(CatalogError::Conflict {
                    collection: collection.to_owned(),
                    key: key.to_owned(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, collection: &str, key: &str, document: Value) -> CatalogResult<()> {
        let path = self.document_path(collection, key)?;
        let staging = self.stage(collection, key, &document).await?;
        if let Err(err) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> CatalogResult<Option<Value>> {
        let path = self.document_path(collection, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, collection: &str, key: &str) -> CatalogResult<bool> {
        let path = self.document_path(collection, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, collection: &str) -> CatalogResult<Vec<Value>> {
        let dir = self.collection_dir(collection)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            match serde_json::from_slice(&bytes) {
                Ok(document) => documents.push(document),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping undecodable document");
                }
            }
        }
        Ok(documents)
    }
}
