//! # horrea-blob: bulk content transfer core
//!
//! `horrea-blob` moves binary objects that are too large or too
//! unstructured for a key-value store between clients and durable storage,
//! over a chunked streaming protocol.
//!
//! ## Key Features
//!
//! - **Bounded blobs**: every transfer buffers into a [`Blob`] whose capacity
//!   is fixed by the size the client declared up front
//! - **Chunked streaming**: a [`ChunkIterator`] slices content for the wire
//! - **All-or-nothing persistence**: short or overflowing transfers never
//!   reach the backend
//! - **Pluggable backends**: local directory today, object storage reserved
//! - **Backpressure**: one budget bounds the bytes buffered across all
//!   concurrent transfers
//!
//! ## Quick Start
//!
//! ```rust
//! use horrea_blob::prelude::*;
//! use futures::stream;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let service = StreamingService::new(Arc::new(MemoryStore::new()), BlobConfig::default())?;
//! let identity = BlobIdentity::new("job-1", "0", BlobKind::Input);
//!
//! // PUT: descriptor first, then chunks
//! let messages = vec![
//!     Ok::<_, std::convert::Infallible>(PutContentReq::Info(BlobDescriptor::new(identity.clone(), 5))),
//!     Ok(PutContentReq::Chunk(Chunk::new(&b"hello"[..]))),
//! ];
//! service.put_content(stream::iter(messages)).await?;
//!
//! // GET: chunks pushed into any sink
//! let (tx, _rx) = futures::channel::mpsc::unbounded::<Chunk>();
//! service.get_content(GetContentReq::new(identity), tx).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ StreamingService │  ← ingest / fetch protocol
//! ├──────────────────┤
//! │ Blob + Iterator  │  ← per-transfer buffer and cursor
//! ├──────────────────┤
//! │   BackendStore   │  ← identity-keyed durable bytes
//! └──────────────────┘
//! ```

mod blob;
mod budget;
mod config;
mod error;
mod iter;
mod local_store;
mod memory_store;
pub mod service;
pub mod store;
mod types;

pub use blob::Blob;
pub use budget::{TransferBudget, TransferPermit};
pub use config::{BackendMode, BlobConfig, ObjectStoreParams, ENV_PREFIX};
pub use error::{BlobError, BlobResult};
pub use iter::{ChunkIterator, Slices};
pub use local_store::LocalDirStore;
pub use memory_store::MemoryStore;
pub use service::StreamingService;
pub use store::{Backend, BackendStore, DottedKeyStrategy, KindStrategies, KindStrategy};
pub use types::{
    BlobDescriptor, BlobIdentity, BlobKind, ByteStream, Chunk, GetContentReq, PutContentReq,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BackendStore, Blob, BlobConfig, BlobDescriptor, BlobError, BlobIdentity, BlobKind,
        BlobResult, Chunk, ChunkIterator, GetContentReq, MemoryStore, PutContentReq,
        StreamingService,
    };
}
