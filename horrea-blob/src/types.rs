use bytes::Bytes;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::{BlobError, BlobResult};

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = BlobResult<Bytes>> + Send>>;

/// Kind of content a blob carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlobKind {
    Raw,
    Tool,
    Input,
    Output,
}

impl BlobKind {
    pub const ALL: [BlobKind; 4] = [BlobKind::Raw, BlobKind::Tool, BlobKind::Input, BlobKind::Output];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlobKind::Raw => "Raw",
            BlobKind::Tool => "Tool",
            BlobKind::Input => "Input",
            BlobKind::Output => "Output",
        }
    }
}

impl std::fmt::Display for BlobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key addressing a blob's storage location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobIdentity {
    pub major: String,
    pub minor: String,
    pub kind: BlobKind,
}

impl BlobIdentity {
    pub fn new<M: Into<String>, N: Into<String>>(major: M, minor: N, kind: BlobKind) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
            kind,
        }
    }

    /// Reject identities that could not be mapped to a single storage location.
    ///
    /// Both parts must be non-empty and free of path separators and dots.
    /// A derived location then never leaves the backend's namespace, and
    /// `major.minor.Kind` splits back into exactly one identity.
    pub fn validate(&self) -> BlobResult<()> {
        for (name, part) in [("major", &self.major), ("minor", &self.minor)] {
            if part.is_empty() {
                return Err(BlobError::malformed(format!("{name} identifier is empty")));
            }
            if part.contains(['/', '\\', '\0', '.']) {
                return Err(BlobError::malformed(format!(
                    "{name} identifier {part:?} is not a valid location component"
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for BlobIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}, {}", self.major, self.minor, self.kind)
    }
}

/// Identity plus the size the client promises to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub identity: BlobIdentity,
    pub declared_size: u64,
}

impl BlobDescriptor {
    pub fn new(identity: BlobIdentity, declared_size: u64) -> Self {
        Self {
            identity,
            declared_size,
        }
    }
}

/// One slice of blob content on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Bytes,
}

impl Chunk {
    pub fn new<B: Into<Bytes>>(data: B) -> Self {
        Self { data: data.into() }
    }
}

/// Inbound message of an ingest call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutContentReq {
    /// Must be the first message of the call
    Info(BlobDescriptor),
    Chunk(Chunk),
}

/// Request of a fetch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetContentReq {
    pub identity: BlobIdentity,
}

impl GetContentReq {
    pub fn new(identity: BlobIdentity) -> Self {
        Self { identity }
    }
}
