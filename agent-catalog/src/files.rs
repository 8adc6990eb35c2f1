//! Write-once storage for artifact source code.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use agent_primitives::ToolId;
use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::CatalogResult;

const SOURCE_EXTENSION: &str = "py";

/// Trait implemented by artifact source stores.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes `source` under `id` unless something already lives there.
    ///
    /// Returns `false` without touching the existing file when the
    /// identifier is taken.
    async fn create(&self, id: &ToolId, source: &str) -> CatalogResult<bool>;

    /// Returns true when a file exists for `id`.
    async fn exists(&self, id: &ToolId) -> CatalogResult<bool>;

    /// Reads the source for `id`.
    async fn read(&self, id: &ToolId) -> CatalogResult<Option<String>>;

    /// Removes the source for `id`, returning whether it existed.
    async fn remove(&self, id: &ToolId) -> CatalogResult<bool>;

    /// Lists every stored identifier, ordered.
    async fn list(&self) -> CatalogResult<Vec<ToolId>>;

    /// File name recorded in the catalog for `id`.
    fn file_name(&self, id: &ToolId) -> String {
        format!("{id}.{SOURCE_EXTENSION}")
    }
}

/// Directory of `<id>.py` files.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    dir: PathBuf,
}

impl LocalFileStore {
    /// Opens (or creates) the directory.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors raised while creating the directory.
    pub async fn open(dir: impl Into<PathBuf>) -> CatalogResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Returns the directory holding the files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute location of the file for `id`.
    #[must_use]
    pub fn path_of(&self, id: &ToolId) -> PathBuf {
        self.dir.join(self.file_name(id))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn create(&self, id: &ToolId, source: &str) -> CatalogResult<bool> {
        let path = self.path_of(id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(tool = %id, "source file already exists");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(source.as_bytes()).await?;
        file.flush().await?;
        Ok(true)
    }

    async fn exists(&self, id: &ToolId) -> CatalogResult<bool> {
        Ok(fs::try_exists(self.path_of(id)).await?)
    }

    async fn read(&self, id: &ToolId) -> CatalogResult<Option<String>> {
        match fs::read_to_string(self.path_of(id)).await {
            Ok(source) => Ok(Some(source)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, id: &ToolId) -> CatalogResult<bool> {
        match fs::remove_file(self.path_of(id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self) -> CatalogResult<Vec<ToolId>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != SOURCE_EXTENSION) {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| ToolId::new(stem).ok())
            else {
                continue;
            };
            ids.push(id);
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-process source store used by tests.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: RwLock<BTreeMap<ToolId, String>>,
}

impl MemoryFileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn create(&self, id: &ToolId, source: &str) -> CatalogResult<bool> {
        let mut guard = self.files.write().await;
        if guard.contains_key(id) {
            return Ok(false);
        }
        guard.insert(id.clone(), source.to_owned());
        Ok(true)
    }

    async fn exists(&self, id: &ToolId) -> CatalogResult<bool> {
        Ok(self.files.read().await.contains_key(id))
    }

    async fn read(&self, id: &ToolId) -> CatalogResult<Option<String>> {
        Ok(self.files.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &ToolId) -> CatalogResult<bool> {
        Ok(self.files.write().await.remove(id).is_some())
    }

    async fn list(&self) -> CatalogResult<Vec<ToolId>> {
        Ok(self.files.read().await.keys().cloned().collect())
    }
}
