use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use opendal::Operator;
use opendal::services;

use crate::{Error, Result};

/// The object store contract the pipeline needs: transcript download and
/// backup upload, nothing more.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}

/// Production store over an opendal [`Operator`] (S3 in deployment, local
/// filesystem for single-machine runs).
pub struct OpendalStore {
    op: Operator,
}

impl OpendalStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn s3(
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let mut builder = services::S3::default().bucket(bucket).region(region);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint(endpoint);
        }
        let op = Operator::new(builder)?.finish();
        Ok(Self { op })
    }

    pub fn fs(root: &str) -> Result<Self> {
        let builder = services::Fs::default().root(root);
        let op = Operator::new(builder)?.finish();
        Ok(Self { op })
    }
}

#[async_trait]
impl BlobStore for OpendalStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let buffer = self.op.read(key).await?;
        Ok(buffer.to_vec())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.op.write(key, bytes).await?;
        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.to_string(), bytes.into());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| Error::Blob("lock poisoned".to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Blob(format!("no such object: {}", key)))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| Error::Blob("lock poisoned".to_string()))?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }
}

/// Backup key derived from a raw transcript key: sibling `parsed/` prefix,
/// `.json` payload.
///
/// `transcripts/{ws}/{sess}/raw.jsonl` -> `parsed/{ws}/{sess}/parsed.json`
pub fn backup_key(raw_key: &str) -> String {
    let mut key = match raw_key.strip_prefix("transcripts/") {
        Some(rest) => format!("parsed/{}", rest),
        None => format!("parsed/{}", raw_key),
    };
    if let Some(stripped) = key.strip_suffix("raw.jsonl") {
        key = format!("{}parsed.json", stripped);
    } else {
        key.push_str(".parsed.json");
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_key_for_canonical_layout() {
        assert_eq!(
            backup_key("transcripts/github.com/u/r/cc-A/raw.jsonl"),
            "parsed/github.com/u/r/cc-A/parsed.json"
        );
    }

    #[test]
    fn test_backup_key_for_odd_keys() {
        assert_eq!(backup_key("somewhere/else.jsonl"), "parsed/somewhere/else.jsonl.parsed.json");
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryBlobStore::new();
        store.put("k", b"body".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), b"body");
        assert!(store.get("missing").await.is_err());
    }
}
