use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::StoreError;

const META_SUFFIX: &str = ".meta.json";

/// Object storage addressed by bucket + key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` under `bucket/key`, replacing any existing object.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Copy the object at `bucket/key` to `local_path`.
    async fn get(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError>;
}

/// Metadata kept next to every stored object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: String,
    pub size_bytes: u64,
}

/// Blob store backed by a directory tree: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `bucket/key` to a path under the root, rejecting anything that
    /// could escape it or shadow a metadata file.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_bucket(bucket)?;
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.into(),
                reason: "empty key",
            });
        }
        if key.starts_with('/') {
            return Err(StoreError::InvalidKey {
                key: key.into(),
                reason: "absolute key",
            });
        }
        if key.split('/').any(|seg| seg == "..") {
            return Err(StoreError::InvalidKey {
                key: key.into(),
                reason: "parent segment",
            });
        }
        if key.ends_with(META_SUFFIX) {
            return Err(StoreError::InvalidKey {
                key: key.into(),
                reason: "reserved suffix",
            });
        }
        Ok(self.root.join(bucket).join(key))
    }

    /// Read the metadata of a stored object, if present.
    pub async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, StoreError> {
        let path = meta_path(&self.object_path(bucket, key)?);
        match fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(path, err)),
        }
    }
}

fn validate_bucket(bucket: &str) -> Result<(), StoreError> {
    if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains('/') {
        return Err(StoreError::InvalidKey {
            key: bucket.into(),
            reason: "invalid bucket name",
        });
    }
    Ok(())
}

fn meta_path(object: &Path) -> PathBuf {
    let mut name = object.as_os_str().to_owned();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

/// Write through a uniquely named temp file and rename into place, so
/// concurrent writers of one key never interleave and the last rename wins.
async fn write_replace(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".tmp-{}", Uuid::new_v4()));
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    if let Err(err) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(path, err));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        write_replace(&path, bytes).await?;
        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            size_bytes: bytes.len() as u64,
        };
        write_replace(&meta_path(&path), &serde_json::to_vec(&meta)?).await?;
        debug!(path = %path.display(), "stored object");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if !fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?
        {
            return Err(StoreError::NotFound {
                bucket: bucket.into(),
                key: key.into(),
            });
        }
        if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        fs::copy(&path, local_path)
            .await
            .map_err(|e| StoreError::io(local_path, e))?;
        Ok(())
    }
}
