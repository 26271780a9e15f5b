//! A dynamically growing byte container with a hard maximum length
//! (spec.md §4.A).

/// A byte buffer that grows by doubling its capacity up to a hard maximum.
///
/// Mutated only through [`ByteBuffer::append`] and [`ByteBuffer::reset`], the
/// same discipline as the scratch buffers in a zero-copy pull parser: the
/// buffer only ever grows monotonically between resets, so slices taken from
/// [`ByteBuffer::bytes`] stay valid until the next mutation. Allocation
/// failure is not modeled as a `Result` — like the rest of this pipeline, it
/// aborts the process, since it reflects environment failure rather than
/// malformed input (spec.md §7).
#[derive(Debug, Default)]
pub struct ByteBuffer {
    data: Vec<u8>,
    max_cap: usize,
    had_nul: bool,
}

impl ByteBuffer {
    /// Creates an empty buffer with the given initial capacity, which grows
    /// by doubling up to `max_cap`.
    pub fn new(initial_cap: usize, max_cap: usize) -> Self {
        debug_assert!(
            max_cap <= usize::MAX / 2,
            "max_cap must allow doubling without overflow"
        );
        ByteBuffer {
            data: Vec::with_capacity(initial_cap.min(max_cap)),
            max_cap,
            had_nul: false,
        }
    }

    /// Clears the buffer's contents. When `keep_allocation` is false, the
    /// backing allocation is released too.
    pub fn reset(&mut self, keep_allocation: bool) {
        self.data.clear();
        self.had_nul = false;
        if !keep_allocation {
            self.data.shrink_to(0);
        }
    }

    /// Appends a single byte, doubling the backing allocation first if it is
    /// full and below `max_cap`.
    ///
    /// Returns `Err(())` without mutating the buffer when appending would
    /// exceed `max_cap`. The caller maps that into the block-specific error
    /// variant (`LongToken` for the key buffer, `LongStr` for the value
    /// buffer), since the same overflow means different things in the two
    /// buffers (spec.md §4.D.iii).
    pub fn append(&mut self, byte: u8) -> Result<(), ()> {
        if self.data.len() == self.max_cap {
            return Err(());
        }
        if self.data.len() == self.data.capacity() {
            let doubled = self.data.capacity().max(1).saturating_mul(2);
            let new_cap = doubled.min(self.max_cap);
            self.data.reserve(new_cap - self.data.len());
        }
        if byte == 0 {
            self.had_nul = true;
        }
        self.data.push(byte);
        Ok(())
    }

    /// Removes the last byte, if any.
    pub fn drop_last(&mut self) {
        self.data.pop();
    }

    /// The number of bytes currently stored.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A view of the buffer's live contents.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The last byte appended, if any.
    pub fn last(&self) -> Option<u8> {
        self.data.last().copied()
    }

    /// Whether a zero byte has ever been appended since the last reset.
    pub fn had_nul(&self) -> bool {
        self.had_nul
    }
}
