use std::ops::Range;

use crate::{Blob, BlobError, BlobResult};

/// Cursor that walks a blob buffer in slices of at most `chunk_size` bytes.
///
/// The iterator holds no reference to the blob, only an offset, so the same
/// instance can be handed a different blob between calls. The offset only
/// ever moves forward.
#[derive(Debug, Clone)]
pub struct ChunkIterator {
    chunk_size: usize,
    next: usize,
}

impl ChunkIterator {
    pub fn new(chunk_size: usize, start: usize) -> BlobResult<Self> {
        if chunk_size == 0 {
            return Err(BlobError::configuration("chunk size must be non-zero"));
        }
        Ok(Self {
            chunk_size,
            next: start,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Offset of the first byte the next call will return.
    pub fn offset(&self) -> usize {
        self.next
    }

    /// Claim the next range of a buffer that is `len` bytes long.
    ///
    /// Returns [`BlobError::EndOfBuffer`] once the offset has reached `len`.
    pub fn next_range(&mut self, len: usize) -> BlobResult<Range<usize>> {
        let start = self.next;
        if start >= len {
            return Err(BlobError::EndOfBuffer);
        }
        let end = start.saturating_add(self.chunk_size).min(len);
        self.next = end;
        Ok(start..end)
    }

    /// Pop the next slice of `blob`'s buffer.
    pub fn next_chunk<'a>(&mut self, blob: &'a Blob) -> BlobResult<&'a [u8]> {
        let range = self.next_range(blob.len())?;
        Ok(&blob.buffer()[range])
    }

    /// Drain the remaining slices of `blob` as a std iterator.
    pub fn slices(self, blob: &Blob) -> Slices<'_> {
        Slices { iter: self, blob }
    }
}

/// Iterator adapter returned by [`ChunkIterator::slices`]
pub struct Slices<'a> {
    iter: ChunkIterator,
    blob: &'a Blob,
}

impl<'a> Iterator for Slices<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next_chunk(self.blob).ok()
    }
}
