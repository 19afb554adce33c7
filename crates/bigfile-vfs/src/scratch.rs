//! Decompression buffer reuse.
//!
//! Compressed entries are decompressed whole on open. To avoid allocating
//! a fresh buffer for every open, the pool keeps one buffer around between
//! opens, grown to the largest entry seen (up to a configured limit).
//!
//! Buffers move into the handle that borrows them and move back on close,
//! so two open handles can never share one.

use tracing::trace;

/// A decompression buffer and where it came from.
#[derive(Debug)]
pub enum DecompressedBuffer {
    /// The pool's retained buffer, lent out
    Scratch(Vec<u8>),
    /// A buffer allocated for one handle
    Dedicated(Vec<u8>),
}

impl DecompressedBuffer {
    /// The buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Scratch(buf) | Self::Dedicated(buf) => buf,
        }
    }

    /// The buffer contents, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Self::Scratch(buf) | Self::Dedicated(buf) => buf,
        }
    }

    /// Whether this buffer was lent by the pool.
    pub const fn is_scratch(&self) -> bool {
        matches!(self, Self::Scratch(_))
    }

    /// Length of the buffer contents.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_vec(self) -> Vec<u8> {
        match self {
            Self::Scratch(buf) | Self::Dedicated(buf) => buf,
        }
    }
}

/// Pool holding at most one reusable buffer.
#[derive(Debug)]
pub struct ScratchPool {
    retained: Option<Vec<u8>>,
    limit: usize,
}

impl ScratchPool {
    /// Create an empty pool that keeps buffers up to `limit` bytes.
    pub const fn new(limit: usize) -> Self {
        Self {
            retained: None,
            limit,
        }
    }

    /// Get a zeroed buffer of exactly `len` bytes.
    ///
    /// Lends the retained buffer when it is free and large enough,
    /// otherwise allocates a dedicated one.
    pub fn borrow(&mut self, len: usize) -> DecompressedBuffer {
        match self.retained.take() {
            Some(mut buf) if buf.capacity() >= len => {
                buf.clear();
                buf.resize(len, 0);
                trace!("Lending scratch buffer ({} of {} bytes)", len, buf.capacity());
                DecompressedBuffer::Scratch(buf)
            }
            retained => {
                self.retained = retained;
                trace!("Allocating dedicated buffer ({} bytes)", len);
                DecompressedBuffer::Dedicated(vec![0u8; len])
            }
        }
    }

    /// Return a buffer to the pool.
    ///
    /// The pool keeps whichever buffer is larger, provided it fits within
    /// the limit; the other is freed.
    pub fn give_back(&mut self, buffer: DecompressedBuffer) {
        let buf = buffer.into_vec();
        if buf.capacity() > self.limit {
            return;
        }
        match &self.retained {
            Some(current) if current.capacity() >= buf.capacity() => {}
            _ => {
                trace!("Retaining {} byte scratch buffer", buf.capacity());
                self.retained = Some(buf);
            }
        }
    }

    /// Capacity of the buffer currently held, if any.
    pub fn retained_capacity(&self) -> Option<usize> {
        self.retained.as_ref().map(Vec::capacity)
    }

    /// Retention limit in bytes.
    pub const fn limit(&self) -> usize {
        self.limit
    }
}
