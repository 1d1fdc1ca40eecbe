use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::Disease;

/// `file_path` is the storage key `<owner>/<millis>.<ext>`, relative to the store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub file_path: String,
    pub file_name: String,
}

#[async_trait]
pub trait ImageStorage {
    async fn upload_image(
        &self,
        owner: Uuid,
        disease: Disease,
        source: &Path,
    ) -> Result<StoredImage, StorageError>;
}

/// Files uploads under `<root>/<owner>/<epoch-millis>.<ext>`.
#[derive(Debug, Clone)]
pub struct LocalImageStorage {
    root: PathBuf,
    owner_quota_bytes: Option<u64>,
}

impl LocalImageStorage {
    pub fn new(root: impl Into<PathBuf>, owner_quota_bytes: Option<u64>) -> Self {
        Self {
            root: root.into(),
            owner_quota_bytes,
        }
    }

    /// Filesystem location of a stored key.
    pub fn resolve(&self, file_path: &str) -> PathBuf {
        self.root.join(file_path)
    }

    async fn owner_usage(&self, owner_dir: &Path) -> Result<u64, StorageError> {
        let mut used = 0u64;
        let mut entries = match tokio::fs::read_dir(owner_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            used += entry.metadata().await?.len();
        }
        Ok(used)
    }
}

pub fn object_key(owner: Uuid, source: &Path, millis: i64) -> String {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("bin");
    format!("{owner}/{millis}.{ext}")
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn upload_image(
        &self,
        owner: Uuid,
        disease: Disease,
        source: &Path,
    ) -> Result<StoredImage, StorageError> {
        let metadata = match tokio::fs::metadata(source).await {
            Ok(m) if m.is_file() => m,
            _ => return Err(StorageError::MissingFile(source.display().to_string())),
        };

        let owner_dir = self.root.join(owner.to_string());
        if let Some(limit) = self.owner_quota_bytes {
            let used = self.owner_usage(&owner_dir).await? + metadata.len();
            if used > limit {
                return Err(StorageError::QuotaExceeded { used, limit });
            }
        }

        let key = object_key(owner, source, Utc::now().timestamp_millis());
        let target = self.root.join(&key);
        tokio::fs::create_dir_all(&owner_dir).await?;
        tokio::fs::copy(source, &target).await?;

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.clone());

        tracing::info!(%owner, %disease, path = %target.display(), "image stored");
        Ok(StoredImage {
            file_path: key,
            file_name,
        })
    }
}
