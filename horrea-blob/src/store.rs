use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::{
    BackendMode, BlobConfig, BlobError, BlobIdentity, BlobKind, BlobResult, LocalDirStore,
    MemoryStore, ObjectStoreParams,
};

/// Durable storage keyed by blob identity - implemented by every backend.
///
/// Calls trade whole objects; there are no range reads or partial updates.
/// Implementations must tolerate concurrent calls on distinct identities.
#[async_trait]
pub trait BackendStore: Send + Sync {
    /// Persist `content`, replacing anything stored under `identity`.
    ///
    /// A concurrent reader of the same identity must never observe a
    /// partially written object.
    async fn write(&self, identity: &BlobIdentity, content: Bytes) -> BlobResult<()>;

    /// Read the full content stored under `identity`, or [`BlobError::NotFound`].
    async fn read(&self, identity: &BlobIdentity) -> BlobResult<Vec<u8>>;

    /// Length of the content stored under `identity`, without loading it.
    async fn size(&self, identity: &BlobIdentity) -> BlobResult<u64>;

    /// Short name of the backend, used in logs
    fn name(&self) -> &'static str;
}

/// Behavior that may vary with the kind of a blob
pub trait KindStrategy: Send + Sync {
    /// Location key for an identity, unique within a backend
    fn object_key(&self, identity: &BlobIdentity) -> String;

    /// Inspect content before it is persisted; an error aborts the write.
    fn validate_write(&self, _identity: &BlobIdentity, _content: &[u8]) -> BlobResult<()> {
        Ok(())
    }
}

/// Default strategy: `major.minor.Kind`
#[derive(Debug, Clone, Copy, Default)]
pub struct DottedKeyStrategy;

impl KindStrategy for DottedKeyStrategy {
    fn object_key(&self, identity: &BlobIdentity) -> String {
        format!("{}.{}.{}", identity.major, identity.minor, identity.kind)
    }
}

/// One strategy per [`BlobKind`], defaulting to [`DottedKeyStrategy`]
#[derive(Clone)]
pub struct KindStrategies {
    by_kind: [Arc<dyn KindStrategy>; 4],
}

impl Default for KindStrategies {
    fn default() -> Self {
        let dotted: Arc<dyn KindStrategy> = Arc::new(DottedKeyStrategy);
        Self {
            by_kind: [dotted.clone(), dotted.clone(), dotted.clone(), dotted],
        }
    }
}

impl std::fmt::Debug for KindStrategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindStrategies").finish_non_exhaustive()
    }
}

impl KindStrategies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the strategy used for one kind
    pub fn with<S: KindStrategy + 'static>(mut self, kind: BlobKind, strategy: S) -> Self {
        self.by_kind[Self::slot(kind)] = Arc::new(strategy);
        self
    }

    pub fn get(&self, kind: BlobKind) -> &dyn KindStrategy {
        self.by_kind[Self::slot(kind)].as_ref()
    }

    /// Validated location key for an identity
    pub fn object_key(&self, identity: &BlobIdentity) -> BlobResult<String> {
        identity.validate()?;
        Ok(self.get(identity.kind).object_key(identity))
    }

    fn slot(kind: BlobKind) -> usize {
        match kind {
            BlobKind::Raw => 0,
            BlobKind::Tool => 1,
            BlobKind::Input => 2,
            BlobKind::Output => 3,
        }
    }
}

/// The backend selected by configuration, constructed once at startup
#[derive(Debug)]
pub enum Backend {
    Local(LocalDirStore),
    Memory(MemoryStore),
    /// Reserved; every operation fails with [`BlobError::UnsupportedBackend`]
    ObjectStore(ObjectStoreParams),
}

impl Backend {
    /// Build the backend named by `config.backend`, preparing local resources.
    pub async fn configure(config: &BlobConfig) -> BlobResult<Self> {
        Self::configure_with(config, KindStrategies::default()).await
    }

    pub async fn configure_with(config: &BlobConfig, strategies: KindStrategies) -> BlobResult<Self> {
        info!("Configuring {} backend", config.backend.as_str());
        match config.backend {
            BackendMode::Local => {
                let store = LocalDirStore::open(&config.local_directory)
                    .await?
                    .with_strategies(strategies);
                Ok(Backend::Local(store))
            }
            BackendMode::ObjectStore => Ok(Backend::ObjectStore(config.object_store.clone())),
        }
    }

    pub fn into_shared(self) -> Arc<dyn BackendStore> {
        Arc::new(self)
    }
}

#[async_trait]
impl BackendStore for Backend {
    async fn write(&self, identity: &BlobIdentity, content: Bytes) -> BlobResult<()> {
        match self {
            Backend::Local(store) => store.write(identity, content).await,
            Backend::Memory(store) => store.write(identity, content).await,
            Backend::ObjectStore(_) => Err(BlobError::unsupported(BackendMode::ObjectStore.as_str())),
        }
    }

    async fn read(&self, identity: &BlobIdentity) -> BlobResult<Vec<u8>> {
        match self {
            Backend::Local(store) => store.read(identity).await,
            Backend::Memory(store) => store.read(identity).await,
            Backend::ObjectStore(_) => Err(BlobError::unsupported(BackendMode::ObjectStore.as_str())),
        }
    }

    async fn size(&self, identity: &BlobIdentity) -> BlobResult<u64> {
        match self {
            Backend::Local(store) => store.size(identity).await,
            Backend::Memory(store) => store.size(identity).await,
            Backend::ObjectStore(_) => Err(BlobError::unsupported(BackendMode::ObjectStore.as_str())),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Backend::Local(store) => store.name(),
            Backend::Memory(store) => store.name(),
            Backend::ObjectStore(_) => BackendMode::ObjectStore.as_str(),
        }
    }
}
