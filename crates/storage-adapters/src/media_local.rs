//! # LocalMediaStorage
//!
//! Local filesystem implementation of `MediaStorage`.
//! Files land under `root/<owner>/<uuid>-<content-hash>.<ext>` and are served by the
//! HTTP layer from `url_prefix`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use domains::{DomainError, MediaStorage, Result, StoredObject};
use tokio::fs;

use crate::{object_key, sanitize_segment};

pub struct LocalMediaStorage {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/uploads")
    url_prefix: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root_path: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Resolves a storage key to a path, refusing anything that escapes root.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(DomainError::Validation(format!("invalid storage key {key:?}")));
        }
        Ok(self.root_path.join(rel))
    }
}

fn io_err(err: std::io::Error) -> DomainError {
    DomainError::Storage(err.to_string())
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    /// Saves an upload under a fresh key; nothing existing is overwritten.
    async fn save(
        &self,
        owner: &str,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject> {
        let owner = sanitize_segment(owner)?;
        let key = object_key(&owner, file_name, content_type, &data);
        let target = self.resolve(&key)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        fs::write(&target, &data).await.map_err(io_err)?;

        tracing::debug!(key = %key, bytes = data.len(), "stored upload");
        Ok(StoredObject { url: format!("{}/{}", self.url_prefix, key), key })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }
}
