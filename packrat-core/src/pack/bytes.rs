//! Shared, cheaply sliceable view over pack bytes

use std::fmt;
use std::ops::{Deref, Range};
use std::sync::Arc;

use memmap2::Mmap;

/// Reference-counted byte region backed by a memory map or an owned buffer.
///
/// Slicing shares the backing storage, so table payloads and record regions
/// are never copied out of the map.
#[derive(Clone)]
pub struct PackBytes {
    data: Arc<dyn AsRef<[u8]> + Send + Sync>,
    range: Range<usize>,
}

impl PackBytes {
    pub fn from_mmap(mmap: Mmap) -> Self {
        let len = mmap.len();
        Self {
            data: Arc::new(mmap),
            range: 0..len,
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            data: Arc::new(data),
            range: 0..len,
        }
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Sub-view relative to this view. Panics if `range` exceeds the view.
    pub fn slice(&self, range: Range<usize>) -> Self {
        assert!(
            range.start <= range.end && range.end <= self.len(),
            "slice {:?} out of bounds for {} bytes",
            range,
            self.len()
        );
        let start = self.range.start + range.start;
        let end = self.range.start + range.end;
        Self {
            data: Arc::clone(&self.data),
            range: start..end,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        let data: &[u8] = (*self.data).as_ref();
        &data[self.range.clone()]
    }
}

impl AsRef<[u8]> for PackBytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Deref for PackBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl fmt::Debug for PackBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackBytes")
            .field("range", &self.range)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_slices_share_data() {
        let bytes = PackBytes::from_vec((0u8..32).collect());
        let outer = bytes.slice(8..24);
        let inner = outer.slice(4..8);
        assert_eq!(inner.as_slice(), &[12, 13, 14, 15]);
        assert_eq!(outer.len(), 16);
        assert!(bytes.slice(32..32).is_empty());
    }
}
