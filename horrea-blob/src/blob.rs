//! In-memory representation of one content object during a transfer.
//!
//! The buffer capacity is fixed from the declared size when the blob is
//! created and never grows, so a client streaming more than it announced
//! is cut off at the announced size.

use bytes::{Bytes, BytesMut};

use crate::{BlobDescriptor, BlobError, BlobIdentity, BlobResult};

#[derive(Debug)]
pub struct Blob {
    descriptor: BlobDescriptor,
    content: BytesMut,
    capacity: usize,
    read_only: bool,
}

impl Blob {
    /// Create an empty, writable blob sized to `descriptor.declared_size`.
    ///
    /// The caller is expected to have bounded the declared size already;
    /// see [`crate::BlobConfig::max_blob_bytes`].
    pub fn new(descriptor: BlobDescriptor) -> BlobResult<Self> {
        let capacity = usize::try_from(descriptor.declared_size).map_err(|_| {
            BlobError::malformed(format!(
                "declared size {} does not fit in memory",
                descriptor.declared_size
            ))
        })?;

        Ok(Self {
            descriptor,
            content: BytesMut::with_capacity(capacity),
            capacity,
            read_only: false,
        })
    }

    /// Wrap content read back from a backend. The result is complete and read-only.
    ///
    /// Takes over the allocation of `content` without copying it.
    pub fn from_content(identity: BlobIdentity, content: Vec<u8>) -> Self {
        let capacity = content.len();
        Self {
            descriptor: BlobDescriptor::new(identity, capacity as u64),
            content: BytesMut::from(Bytes::from(content)),
            capacity,
            read_only: true,
        }
    }

    /// Append a chunk to the end of the buffer.
    ///
    /// Fails without touching the buffer if the blob is read-only or the
    /// chunk would overrun the declared size.
    pub fn append_chunk(&mut self, data: &[u8]) -> BlobResult<()> {
        if self.read_only {
            return Err(BlobError::ReadOnlyViolation);
        }
        if self.content.len() + data.len() > self.capacity {
            return Err(BlobError::CapacityExceeded {
                capacity: self.capacity as u64,
                len: self.content.len() as u64,
                attempted: data.len() as u64,
            });
        }
        self.content.extend_from_slice(data);
        Ok(())
    }

    pub fn mark_read_only(&mut self) {
        self.read_only = true;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// True once exactly the declared number of bytes has been received.
    pub fn is_complete(&self) -> bool {
        self.content.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.content
    }

    pub fn identity(&self) -> &BlobIdentity {
        &self.descriptor.identity
    }

    pub fn descriptor(&self) -> &BlobDescriptor {
        &self.descriptor
    }

    /// Hand the buffer off, consuming the blob.
    pub fn into_bytes(self) -> Bytes {
        self.content.freeze()
    }
}

impl std::fmt::Display for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {} bytes", self.descriptor.identity, self.descriptor.declared_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlobKind;
    use proptest::prelude::*;

    fn descriptor(size: u64) -> BlobDescriptor {
        BlobDescriptor::new(BlobIdentity::new("1", "2", BlobKind::Raw), size)
    }

    #[test]
    fn test_blob_create() {
        let size = 1024 * 1024;
        let blob = Blob::new(descriptor(size)).unwrap();

        assert_eq!(blob.capacity(), size as usize);
        assert_eq!(blob.len(), 0);
        assert!(!blob.is_read_only());
        assert!(!blob.is_complete());
        assert_eq!(blob.to_string(), "1:2, Raw, 1048576 bytes");
    }

    #[test]
    fn test_zero_size_blob_is_complete() {
        let blob = Blob::new(descriptor(0)).unwrap();
        assert!(blob.is_complete());
        assert!(blob.is_empty());
    }

    #[test]
    fn test_append_fills_buffer() {
        let size = 1024 * 1024;
        let data = vec![67u8; size];
        let mut blob = Blob::new(descriptor(size as u64)).unwrap();

        blob.append_chunk(&data[..size / 2]).unwrap();
        assert_eq!(blob.len(), size / 2);
        assert!(!blob.is_complete());

        blob.append_chunk(&data[size / 2..]).unwrap();
        assert_eq!(blob.capacity(), size);
        assert!(blob.is_complete());
        assert_eq!(blob.buffer(), &data[..]);
    }

    #[test]
    fn test_overflowing_append_is_rejected_whole() {
        let mut blob = Blob::new(descriptor(10)).unwrap();
        blob.append_chunk(b"12345678").unwrap();

        let err = blob.append_chunk(b"abc").unwrap_err();
        assert!(matches!(
            err,
            BlobError::CapacityExceeded { capacity: 10, len: 8, attempted: 3 }
        ));
        assert_eq!(blob.buffer(), b"12345678");

        blob.append_chunk(b"90").unwrap();
        assert!(blob.is_complete());
    }

    #[test]
    fn test_read_only_blocks_append() {
        let mut blob = Blob::new(descriptor(8)).unwrap();
        blob.append_chunk(b"ab").unwrap();
        blob.mark_read_only();
        blob.mark_read_only();

        assert!(blob.is_read_only());
        assert!(matches!(blob.append_chunk(b"cd"), Err(BlobError::ReadOnlyViolation)));
        assert!(matches!(blob.append_chunk(b""), Err(BlobError::ReadOnlyViolation)));
        assert_eq!(blob.buffer(), b"ab");
    }

    #[test]
    fn test_from_content_is_complete_and_read_only() {
        let identity = BlobIdentity::new("x", "y", BlobKind::Input);
        let mut blob = Blob::from_content(identity.clone(), b"hello".to_vec());

        assert_eq!(blob.identity(), &identity);
        assert_eq!(blob.descriptor().declared_size, 5);
        assert!(blob.is_complete());
        assert!(matches!(blob.append_chunk(b"!"), Err(BlobError::ReadOnlyViolation)));
        assert_eq!(blob.into_bytes(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_from_content_and_freeze_reuse_the_allocation() {
        let content = vec![3u8; 4096];
        let origin = content.as_ptr();

        let blob = Blob::from_content(BlobIdentity::new("x", "y", BlobKind::Raw), content);
        assert_eq!(blob.buffer().as_ptr(), origin);
        assert_eq!(blob.into_bytes().as_ptr(), origin);
    }

    proptest! {
        #[test]
        fn prop_exact_chunks_complete(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16)) {
            let expected: Vec<u8> = chunks.concat();
            let mut blob = Blob::new(descriptor(expected.len() as u64)).unwrap();
            for chunk in &chunks {
                blob.append_chunk(chunk).unwrap();
            }
            prop_assert!(blob.is_complete());
            prop_assert_eq!(blob.buffer(), &expected[..]);
        }

        #[test]
        fn prop_never_buffers_past_capacity(
            size in 0u64..256,
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..16),
        ) {
            let mut blob = Blob::new(descriptor(size)).unwrap();
            let mut total = 0u64;
            for chunk in &chunks {
                let result = blob.append_chunk(chunk);
                if total + chunk.len() as u64 > size {
                    prop_assert!(
                        matches!(result, Err(BlobError::CapacityExceeded { .. })),
                        "expected CapacityExceeded"
                    );
                    break;
                }
                prop_assert!(result.is_ok());
                total += chunk.len() as u64;
            }
            prop_assert!(blob.len() as u64 <= size);
            prop_assert_eq!(blob.len() as u64, total);
        }
    }
}
