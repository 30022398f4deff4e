use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{BackendStore, BlobError, BlobIdentity, BlobResult, KindStrategies};

/// In-memory backend for tests and embedded use. Content is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Bytes>>,
    strategies: KindStrategies,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategies(mut self, strategies: KindStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    /// Number of successful writes since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, identity: &BlobIdentity) -> bool {
        match self.strategies.object_key(identity) {
            Ok(key) => self.objects.read().await.contains_key(&key),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl BackendStore for MemoryStore {
    async fn write(&self, identity: &BlobIdentity, content: Bytes) -> BlobResult<()> {
        let key = self.strategies.object_key(identity)?;
        self.strategies.get(identity.kind).validate_write(identity, &content)?;
        self.objects.write().await.insert(key, content);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, identity: &BlobIdentity) -> BlobResult<Vec<u8>> {
        let key = self.strategies.object_key(identity)?;
        self.objects
            .read()
            .await
            .get(&key)
            .map(|content| content.to_vec())
            .ok_or_else(|| BlobError::not_found(key))
    }

    async fn size(&self, identity: &BlobIdentity) -> BlobResult<u64> {
        let key = self.strategies.object_key(identity)?;
        self.objects
            .read()
            .await
            .get(&key)
            .map(|content| content.len() as u64)
            .ok_or_else(|| BlobError::not_found(key))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
