//! Ingest and fetch protocol over chunked streams.
//!
//! Ingest moves through `AwaitDescriptor -> Accumulating -> Finalizing`;
//! fetch through `Resolve -> Emitting`. Each call owns its blob and
//! iterator; only the backend and the transfer budget are shared.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::{pin_mut, Sink, SinkExt, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::{
    Backend, BackendStore, Blob, BlobConfig, BlobDescriptor, BlobError, BlobIdentity, BlobResult,
    ByteStream, Chunk, ChunkIterator, GetContentReq, PutContentReq, TransferBudget, TransferPermit,
};

/// Streaming frontend in front of a [`BackendStore`]
pub struct StreamingService {
    store: Arc<dyn BackendStore>,
    budget: TransferBudget,
    config: BlobConfig,
}

impl StreamingService {
    /// Create a service over an already constructed backend
    pub fn new(store: Arc<dyn BackendStore>, config: BlobConfig) -> BlobResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            budget: TransferBudget::new(config.max_inflight_bytes),
            config,
        })
    }

    /// Configure the backend named in `config` and wrap it
    pub async fn from_config(config: BlobConfig) -> BlobResult<Self> {
        config.validate()?;
        let store = Backend::configure(&config).await?.into_shared();
        Self::new(store, config)
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BackendStore> {
        &self.store
    }

    pub fn budget(&self) -> &TransferBudget {
        &self.budget
    }

    /// Client-streamed PUT.
    ///
    /// The first message must be [`PutContentReq::Info`], every later one a
    /// chunk. Content is persisted only if exactly the declared number of
    /// bytes arrived before the stream ended; otherwise the backend is
    /// never called. Returning `Ok(())` is the acknowledgement.
    #[instrument(skip_all)]
    pub async fn put_content<S, E>(&self, inbound: S) -> BlobResult<()>
    where
        S: Stream<Item = Result<PutContentReq, E>> + Send,
        E: Display,
    {
        pin_mut!(inbound);

        let descriptor = match inbound.next().await {
            Some(Ok(PutContentReq::Info(descriptor))) => descriptor,
            Some(Ok(PutContentReq::Chunk(_))) => {
                return Err(BlobError::malformed("first message must carry blob info"));
            }
            Some(Err(e)) => {
                warn!("Error receiving from client, {}", e);
                return Err(BlobError::transport(e));
            }
            None => return Err(BlobError::malformed("stream ended before blob info")),
        };
        let (mut blob, _permit) = self.begin_ingest(descriptor).await?;
        info!("Request to put BLOB {}", blob);

        while let Some(message) = inbound.next().await {
            match message {
                Ok(PutContentReq::Chunk(chunk)) => {
                    if let Err(e) = blob.append_chunk(&chunk.data) {
                        warn!("Rejecting chunk for {}: {}", blob, e);
                        return Err(e);
                    }
                }
                Ok(PutContentReq::Info(_)) => {
                    return Err(BlobError::malformed("blob info may only be sent once"));
                }
                Err(e) => {
                    warn!("Error receiving from client, {}", e);
                    return Err(BlobError::transport(e));
                }
            }
        }

        if !blob.is_complete() {
            warn!("Expected {} bytes for {}, received {}", blob.capacity(), blob, blob.len());
            return Err(BlobError::IncompleteTransfer {
                expected: blob.capacity() as u64,
                received: blob.len() as u64,
            });
        }

        let identity = blob.identity().clone();
        let size = blob.len();
        if let Err(e) = self.store.write(&identity, blob.into_bytes()).await {
            warn!("Unable to persist received content, {}", e);
            return Err(e);
        }
        info!("Stored {} bytes for {} in {} backend", size, identity, self.store.name());
        Ok(())
    }

    /// Server-streamed GET: push the blob to `sink` in configured chunk sizes.
    ///
    /// A failed send aborts the call; nothing is retried.
    #[instrument(skip(self, sink), fields(identity = %request.identity))]
    pub async fn get_content<K>(&self, request: GetContentReq, sink: K) -> BlobResult<()>
    where
        K: Sink<Chunk> + Send,
        K::Error: Display,
    {
        let (blob, _permit) = self.resolve(&request.identity).await?;
        info!("Request to get BLOB {}", blob);
        let content = blob.into_bytes();

        pin_mut!(sink);
        let mut iter = ChunkIterator::new(self.config.chunk_size_bytes, 0)?;
        let mut sent = 0usize;
        loop {
            let data = match iter.next_range(content.len()) {
                Ok(range) => content.slice(range),
                Err(BlobError::EndOfBuffer) => break,
                Err(e) => return Err(e),
            };
            if let Err(e) = sink.send(Chunk { data }).await {
                warn!("Error sending chunk {} to client, {}", sent, e);
                return Err(BlobError::transport(e));
            }
            sent += 1;
        }
        sink.close().await.map_err(BlobError::transport)?;

        debug!("Sent {} chunks for {}", sent, request.identity);
        Ok(())
    }

    /// Resolve the blob now and return its chunks as a lazily driven stream.
    ///
    /// Lookup failures such as [`BlobError::NotFound`] are returned here,
    /// before any chunk is produced.
    #[instrument(skip(self), fields(identity = %request.identity))]
    pub async fn open_content(&self, request: GetContentReq) -> BlobResult<ByteStream> {
        let (blob, permit) = self.resolve(&request.identity).await?;
        info!("Request to stream BLOB {}", blob);
        let mut iter = ChunkIterator::new(self.config.chunk_size_bytes, 0)?;
        let content = blob.into_bytes();

        let stream = async_stream::stream! {
            let _permit = permit;
            while let Ok(range) = iter.next_range(content.len()) {
                yield Ok(content.slice(range));
            }
        };
        Ok(Box::pin(stream))
    }

    async fn begin_ingest(&self, descriptor: BlobDescriptor) -> BlobResult<(Blob, TransferPermit)> {
        descriptor.identity.validate()?;
        if descriptor.declared_size > self.config.max_blob_bytes {
            return Err(BlobError::malformed(format!(
                "declared size {} exceeds maximum {}",
                descriptor.declared_size, self.config.max_blob_bytes
            )));
        }
        let permit = self.budget.reserve(descriptor.declared_size).await?;
        Ok((Blob::new(descriptor)?, permit))
    }

    /// Load a stored blob once budget for its stored size is held.
    async fn resolve(&self, identity: &BlobIdentity) -> BlobResult<(Blob, TransferPermit)> {
        identity.validate()?;
        let mut expected = self.store.size(identity).await?;
        loop {
            let permit = self.budget.reserve(expected).await?;
            let content = self.store.read(identity).await?;
            if content.len() as u64 <= permit.bytes() {
                let mut blob = Blob::from_content(identity.clone(), content);
                blob.mark_read_only();
                return Ok((blob, permit));
            }
            // replaced by a larger object between the size lookup and the read
            debug!("{} grew from {} to {} bytes, reserving again", identity, expected, content.len());
            expected = content.len() as u64;
        }
    }
}
