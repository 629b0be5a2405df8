//! Key-addressed blob storage for published artifacts
//!
//! Objects are only ever replaced whole. `FsBlobStore` lays them out under
//! `<root>/objects/<key>` (the tree a static host serves) and keeps content
//! metadata under `<root>/meta/<key>.json`.

use super::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub content_type: String,
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` at `key`, replacing any existing object
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> PipelineResult<()>;

    async fn get(&self, key: &str) -> PipelineResult<Option<Vec<u8>>>;

    async fn head(&self, key: &str) -> PipelineResult<Option<BlobMeta>>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// Public location of an object: fixed base host plus key
pub fn public_url(base_host: &str, key: &str) -> String {
    format!("https://{}/{}", base_host.trim_end_matches('/'), key)
}

/// Keys are relative, `/`-separated and may not climb out of the store
pub fn validate_key(key: &str) -> PipelineResult<()> {
    let path = Path::new(key);
    let well_formed = !key.is_empty()
        && !key.ends_with('/')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if well_formed {
        Ok(())
    } else {
        Err(PipelineError::InvalidKey(key.to_string()))
    }
}

/// Directory-backed blob store
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join("objects").join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join("meta").join(format!("{}.json", key))
    }

    /// Write through a temporary sibling and rename over the target
    async fn replace_file(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_optional(path: &Path) -> PipelineResult<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> PipelineResult<()> {
        validate_key(key)?;

        let meta = BlobMeta {
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
        };
        Self::replace_file(&self.object_path(key), bytes).await?;
        Self::replace_file(&self.meta_path(key), &serde_json::to_vec(&meta)?).await?;

        log::debug!("📝 Stored {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> PipelineResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Self::read_optional(&self.object_path(key)).await
    }

    async fn head(&self, key: &str) -> PipelineResult<Option<BlobMeta>> {
        validate_key(key)?;
        match Self::read_optional(&self.meta_path(key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn backend_type(&self) -> &'static str {
        "filesystem"
    }
}

/// In-process blob store, used for dry runs and tests
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        let mut keys: Vec<String> = objects.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> PipelineResult<()> {
        validate_key(key)?;
        let mut objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        objects.insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> PipelineResult<Option<Vec<u8>>> {
        let objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        Ok(objects.get(key).map(|(bytes, _)| bytes.clone()))
    }

    async fn head(&self, key: &str) -> PipelineResult<Option<BlobMeta>> {
        let objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        Ok(objects.get(key).map(|(bytes, content_type)| BlobMeta {
            content_type: content_type.clone(),
            size: bytes.len() as u64,
        }))
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("snapshots.example.com", "daily/2024-03-09/station-1.json"),
            "https://snapshots.example.com/daily/2024-03-09/station-1.json"
        );
        assert_eq!(
            public_url("snapshots.example.com/", "current-available.json"),
            "https://snapshots.example.com/current-available.json"
        );
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("current-available.json").is_ok());
        assert!(validate_key("past-24h/station-3.json").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../escape.json").is_err());
        assert!(validate_key("/absolute.json").is_err());
        assert!(validate_key("dir/").is_err());
    }

    #[tokio::test]
    async fn test_fs_put_get_head_overwrite() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let key = "past-24h/station-1.json";

        assert!(store.get(key).await.unwrap().is_none());
        assert!(store.head(key).await.unwrap().is_none());

        store.put(key, b"{\"v\":1}", JSON_CONTENT_TYPE).await.unwrap();
        store.put(key, b"{\"v\":22}", JSON_CONTENT_TYPE).await.unwrap();

        assert_eq!(store.get(key).await.unwrap().unwrap(), b"{\"v\":22}".to_vec());
        let meta = store.head(key).await.unwrap().unwrap();
        assert_eq!(meta.content_type, "application/json");
        assert_eq!(meta.size, 8);

        // Served tree only holds the object itself
        assert!(dir.path().join("objects").join(key).exists());
        assert!(!dir.path().join("objects/past-24h/station-1.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryBlobStore::new();
        store.put("b.json", b"[]", JSON_CONTENT_TYPE).await.unwrap();
        store.put("a.json", b"{}", JSON_CONTENT_TYPE).await.unwrap();

        assert_eq!(store.keys(), vec!["a.json".to_string(), "b.json".to_string()]);
        assert_eq!(store.head("a.json").await.unwrap().unwrap().size, 2);
        assert!(store.put("../x", b"", JSON_CONTENT_TYPE).await.is_err());
    }
}
