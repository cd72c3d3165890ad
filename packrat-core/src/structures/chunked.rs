//! Chunked columnar arrays
//!
//! A logical index `i` lives in chunk `i >> CHUNK_SHIFT` at offset
//! `i & CHUNK_MASK`. The chunk directory grows by doubling and chunks are
//! allocated on first write, so growing never copies element data.

/// log2 of the chunk size
pub const CHUNK_SHIFT: u32 = 12;
/// Elements per chunk
pub const CHUNK_SIZE: usize = 1 << CHUNK_SHIFT;
/// Mask selecting the in-chunk offset
pub const CHUNK_MASK: u32 = (CHUNK_SIZE as u32) - 1;

/// Logical slot index into chunked storage
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u32);

impl SlotIndex {
    /// Largest representable slot
    pub const MAX: SlotIndex = SlotIndex(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn chunk(self) -> usize {
        (self.0 >> CHUNK_SHIFT) as usize
    }

    #[inline]
    pub const fn offset(self) -> usize {
        (self.0 & CHUNK_MASK) as usize
    }
}

impl From<SlotIndex> for u32 {
    fn from(slot: SlotIndex) -> u32 {
        slot.0
    }
}

/// Number of chunks needed to hold `len` elements
pub fn chunks_for(len: u32) -> usize {
    (len as usize).div_ceil(CHUNK_SIZE)
}

/// One column of fixed-size chunks.
///
/// Addressing a slot whose chunk was never allocated (or beyond a trimmed
/// last chunk) panics; callers keep to `[0, capacity)`.
#[derive(Debug, Clone, Default)]
pub struct ChunkedArray<T> {
    chunks: Vec<Option<Box<[T]>>>,
}

impl<T: Copy + Default> ChunkedArray<T> {
    /// Directory of `chunk_count` unallocated chunks
    pub fn with_chunks(chunk_count: usize) -> Self {
        let mut array = Self { chunks: Vec::new() };
        array.allocate(chunk_count);
        array
    }

    /// Resize the chunk directory to exactly `chunk_count` entries, keeping
    /// the chunks that still fit.
    pub fn allocate(&mut self, chunk_count: usize) {
        self.chunks.resize_with(chunk_count, || None);
        self.chunks.shrink_to_fit();
    }

    /// Double the directory capacity (at least one chunk).
    pub fn grow(&mut self) {
        let target = (self.chunks.len() * 2).max(1);
        self.allocate(target);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Elements addressable without growing the directory
    pub fn capacity(&self) -> usize {
        self.chunks.len() * CHUNK_SIZE
    }

    pub fn is_allocated(&self, chunk: usize) -> bool {
        matches!(self.chunks.get(chunk), Some(Some(_)))
    }

    /// Back `chunk` with a full chunk of storage, allocating it or
    /// re-extending a trimmed last chunk.
    pub fn ensure_chunk(&mut self, chunk: usize) {
        let slot = &mut self.chunks[chunk];
        if let Some(c) = slot {
            if c.len() < CHUNK_SIZE {
                let mut full = c.to_vec();
                full.resize(CHUNK_SIZE, T::default());
                *c = full.into_boxed_slice();
            }
        } else {
            *slot = Some(vec![T::default(); CHUNK_SIZE].into_boxed_slice());
        }
    }

    #[inline]
    pub fn get(&self, slot: SlotIndex) -> T {
        self.chunk(slot.chunk())[slot.offset()]
    }

    #[inline]
    pub fn set(&mut self, slot: SlotIndex, value: T) {
        self.chunk_mut(slot.chunk())[slot.offset()] = value;
    }

    pub fn swap(&mut self, a: SlotIndex, b: SlotIndex) {
        let va = self.get(a);
        let vb = self.get(b);
        self.set(a, vb);
        self.set(b, va);
    }

    /// Shrink the last chunk's storage to `len` elements.
    pub fn trim_last(&mut self, len: usize) {
        if let Some(Some(last)) = self.chunks.last_mut()
            && last.len() > len
        {
            *last = last[..len].to_vec().into_boxed_slice();
        }
    }

    /// Allocated element storage, for memory accounting
    pub fn allocated_elements(&self) -> usize {
        self.chunks.iter().flatten().map(|c| c.len()).sum()
    }

    fn chunk(&self, chunk: usize) -> &[T] {
        match &self.chunks[chunk] {
            Some(c) => &c[..],
            None => panic!("chunk {} is not allocated", chunk),
        }
    }

    fn chunk_mut(&mut self, chunk: usize) -> &mut [T] {
        match &mut self.chunks[chunk] {
            Some(c) => &mut c[..],
            None => panic!("chunk {} is not allocated", chunk),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_decomposition() {
        let slot = SlotIndex::new(3 * CHUNK_SIZE as u32 + 17);
        assert_eq!(slot.chunk(), 3);
        assert_eq!(slot.offset(), 17);
        assert_eq!(SlotIndex::new(CHUNK_MASK).chunk(), 0);
        assert_eq!(SlotIndex::new(CHUNK_MASK + 1).chunk(), 1);
        assert_eq!(SlotIndex::new(CHUNK_MASK + 1).offset(), 0);
    }

    #[test]
    fn test_chunks_for() {
        assert_eq!(chunks_for(0), 0);
        assert_eq!(chunks_for(1), 1);
        assert_eq!(chunks_for(CHUNK_SIZE as u32), 1);
        assert_eq!(chunks_for(CHUNK_SIZE as u32 + 1), 2);
    }

    #[test]
    fn test_lazy_allocation_and_grow() {
        let mut array: ChunkedArray<u32> = ChunkedArray::with_chunks(2);
        assert_eq!(array.capacity(), 2 * CHUNK_SIZE);
        assert!(!array.is_allocated(0));

        let slot = SlotIndex::new(CHUNK_SIZE as u32 + 5);
        array.ensure_chunk(slot.chunk());
        array.set(slot, 99);
        assert!(array.is_allocated(1));
        assert!(!array.is_allocated(0));
        assert_eq!(array.allocated_elements(), CHUNK_SIZE);

        array.grow();
        assert_eq!(array.chunk_count(), 4);
        assert_eq!(array.get(slot), 99);
    }

    #[test]
    fn test_trim() {
        let mut array: ChunkedArray<f64> = ChunkedArray::with_chunks(8);
        for i in 0..(CHUNK_SIZE as u32 + 3) {
            let slot = SlotIndex::new(i);
            array.ensure_chunk(slot.chunk());
            array.set(slot, i as f64);
        }
        array.allocate(2);
        array.trim_last(3);
        assert_eq!(array.chunk_count(), 2);
        assert_eq!(array.allocated_elements(), CHUNK_SIZE + 3);
        assert_eq!(array.get(SlotIndex::new(CHUNK_SIZE as u32 + 2)), (CHUNK_SIZE + 2) as f64);
    }

    #[test]
    #[should_panic]
    fn test_unallocated_chunk_panics() {
        let array: ChunkedArray<u32> = ChunkedArray::with_chunks(1);
        array.get(SlotIndex::new(0));
    }
}
