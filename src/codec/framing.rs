//! Packed blob framing
//!
//! A packed blob is the concatenation of `(u16 little-endian length, chunk)`
//! pairs with no header or trailer. Readers recover chunk boundaries by
//! reading the two-byte prefix and then that many bytes, until the buffer is
//! exhausted.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FramingError;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest chunk that fits the length prefix
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;

/// Pack encoded chunks into a single blob, preserving order.
///
/// Fails without producing output if any chunk is too large for the prefix.
pub fn pack<C: AsRef<[u8]>>(chunks: &[C]) -> Result<Bytes, FramingError> {
    let mut total = 0;
    for (index, chunk) in chunks.iter().enumerate() {
        let len = chunk.as_ref().len();
        if len > MAX_CHUNK_SIZE {
            return Err(FramingError::ChunkTooLarge { index, len });
        }
        total += LENGTH_PREFIX_SIZE + len;
    }

    let mut out = BytesMut::with_capacity(total);
    for chunk in chunks {
        let chunk = chunk.as_ref();
        out.put_u16_le(chunk.len() as u16);
        out.put_slice(chunk);
    }
    Ok(out.freeze())
}

/// Unpack a blob into its chunks.
pub fn unpack(blob: &Bytes) -> Result<Vec<Bytes>, FramingError> {
    let mut chunks = Vec::new();
    let mut reader = FrameReader::new(blob.as_ref());
    while let Some(range) = reader.next_range()? {
        chunks.push(blob.slice(range));
    }
    Ok(chunks)
}

/// Zero-copy cursor over the chunks of a packed blob.
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn next_range(&mut self) -> Result<Option<std::ops::Range<usize>>, FramingError> {
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < LENGTH_PREFIX_SIZE {
            return Err(FramingError::TruncatedStream {
                offset: self.pos,
                expected: LENGTH_PREFIX_SIZE,
                available: remaining,
            });
        }

        let prefix = [self.data[self.pos], self.data[self.pos + 1]];
        let len = u16::from_le_bytes(prefix) as usize;
        let start = self.pos + LENGTH_PREFIX_SIZE;
        let available = self.data.len() - start;
        if available < len {
            return Err(FramingError::TruncatedStream {
                offset: self.pos,
                expected: len,
                available,
            });
        }

        self.pos = start + len;
        Ok(Some(start..start + len))
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<&'a [u8], FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_range() {
            Ok(Some(range)) => Some(Ok(&self.data[range])),
            Ok(None) => None,
            Err(e) => {
                // Stop after the first error
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}
