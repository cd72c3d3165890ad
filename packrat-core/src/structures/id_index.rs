//! Mapping between external ids and dense indexes

use rustc_hash::FxHashMap;

use crate::DenseIndex;

/// Interns i64 ids into dense `0..n` indexes in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    indexes: FxHashMap<i64, DenseIndex>,
    ids: Vec<i64>,
}

impl IdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `id`, assigning the next free index on first use.
    pub fn intern(&mut self, id: i64) -> DenseIndex {
        if let Some(&index) = self.indexes.get(&id) {
            return index;
        }
        let index = self.ids.len() as DenseIndex;
        self.indexes.insert(id, index);
        self.ids.push(id);
        index
    }

    pub fn index_of(&self, id: i64) -> Option<DenseIndex> {
        self.indexes.get(&id).copied()
    }

    /// Id assigned `index`. Panics if the index was never assigned.
    #[inline]
    pub fn id_of(&self, index: DenseIndex) -> i64 {
        self.ids[index as usize]
    }

    pub fn contains(&self, id: i64) -> bool {
        self.indexes.contains_key(&id)
    }

    /// Ids in index order
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut index = IdIndex::new();
        assert_eq!(index.intern(42), 0);
        assert_eq!(index.intern(-7), 1);
        assert_eq!(index.intern(42), 0);
        assert_eq!(index.len(), 2);
        assert_eq!(index.ids(), &[42, -7]);
        assert_eq!(index.id_of(1), -7);
        assert_eq!(index.index_of(-7), Some(1));
        assert_eq!(index.index_of(5), None);
    }
}
