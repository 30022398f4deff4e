use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{BackendStore, BlobError, BlobIdentity, BlobResult, KindStrategies};

/// Backend writing one file per identity into a local directory
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    directory: PathBuf,
    strategies: KindStrategies,
}

impl LocalDirStore {
    /// Use `directory` for storage, creating it if it does not exist.
    pub async fn open<P: AsRef<Path>>(directory: P) -> BlobResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        info!("Creating local file directory {}", directory.display());
        fs::create_dir_all(&directory).await.map_err(|e| {
            BlobError::configuration(format!(
                "cannot prepare local directory {}: {e}",
                directory.display()
            ))
        })?;
        Ok(Self {
            directory,
            strategies: KindStrategies::default(),
        })
    }

    pub fn with_strategies(mut self, strategies: KindStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file holding `identity`
    pub fn location(&self, identity: &BlobIdentity) -> BlobResult<PathBuf> {
        Ok(self.directory.join(self.strategies.object_key(identity)?))
    }

    async fn write_staged(staging: &Path, content: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(staging).await?;
        file.write_all(content).await?;
        file.sync_all().await
    }
}

#[async_trait]
impl BackendStore for LocalDirStore {
    async fn write(&self, identity: &BlobIdentity, content: Bytes) -> BlobResult<()> {
        let key = self.strategies.object_key(identity)?;
        self.strategies.get(identity.kind).validate_write(identity, &content)?;

        let target = self.directory.join(&key);
        // Staged next to the target so the rename stays on one filesystem.
        // The name length is fixed, so any key that fits also stages.
        let staging = self.directory.join(format!(".{}.partial", Uuid::new_v4().simple()));
        info!("Writing local file content to {}", target.display());

        let committed = match Self::write_staged(&staging, &content).await {
            Ok(()) => fs::rename(&staging, &target).await,
            Err(e) => Err(e),
        };
        if let Err(e) = committed {
            if let Err(cleanup) = fs::remove_file(&staging).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!("Could not remove staging file {}: {}", staging.display(), cleanup);
                }
            }
            return Err(e.into());
        }

        debug!("Persisted {} bytes for {}", content.len(), identity);
        Ok(())
    }

    async fn read(&self, identity: &BlobIdentity) -> BlobResult<Vec<u8>> {
        let key = self.strategies.object_key(identity)?;
        let path = self.directory.join(&key);
        info!("Reading local file content from {}", path.display());

        match fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, identity: &BlobIdentity) -> BlobResult<u64> {
        let key = self.strategies.object_key(identity)?;
        match fs::metadata(self.directory.join(&key)).await {
            Ok(metadata) if metadata.is_file() => Ok(metadata.len()),
            Ok(_) => Err(BlobError::not_found(key)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
