//! # Local media store
//!
//! Filesystem `ObjectStorage`: `{root}/{bucket}/{path}` on disk, served by
//! the binary under `{url_prefix}/{bucket}/{path}`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use domains::{ObjectStorage, StorageError};
use tokio::fs;
use tracing::debug;

use crate::SetupError;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g. "./data/media").
    root_path: PathBuf,
    /// Public URL prefix (e.g. "/media").
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Result<Self, SetupError> {
        let root_path = root.into();
        std::fs::create_dir_all(&root_path)
            .map_err(|e| SetupError::MediaRoot(root_path.display().to_string(), e.to_string()))?;
        Ok(Self {
            root_path,
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Resolves an object key to a file below the root. Keys that would
    /// escape it (absolute paths, `..`) are refused.
    fn target(&self, bucket: &str, path: &str) -> Option<PathBuf> {
        let relative = Path::new(bucket).join(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root_path.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalMediaStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let failed = |message: String| StorageError::Upload {
            path: path.to_string(),
            message,
        };
        let target = self
            .target(bucket, path)
            .ok_or_else(|| failed("path escapes the media root".into()))?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| failed(e.to_string()))?;
        }
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Err(failed("object already exists".into()));
        }
        fs::write(&target, &data).await.map_err(|e| failed(e.to_string()))?;
        debug!(path = %target.display(), bytes = data.len(), "media written");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.url_prefix, bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_below_root_and_builds_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/media/").unwrap();

        store
            .upload("temple", "gallery/images/1_a.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();

        let on_disk = std::fs::read(dir.path().join("temple/gallery/images/1_a.jpg")).unwrap();
        assert_eq!(on_disk, b"jpeg");
        assert_eq!(
            store.public_url("temple", "gallery/images/1_a.jpg"),
            "/media/temple/gallery/images/1_a.jpg"
        );
    }

    #[tokio::test]
    async fn refuses_traversal_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "/media").unwrap();

        let escape = store
            .upload("temple", "../../etc/passwd", Bytes::from_static(b"x"), "text/plain")
            .await;
        assert!(escape.is_err());

        store
            .upload("temple", "posts/1_a.jpg", Bytes::from_static(b"a"), "image/jpeg")
            .await
            .unwrap();
        let again = store
            .upload("temple", "posts/1_a.jpg", Bytes::from_static(b"b"), "image/jpeg")
            .await;
        assert!(again.is_err());
    }
}
