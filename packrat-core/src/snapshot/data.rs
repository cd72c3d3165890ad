//! Frozen packed preferences and their collections

use crate::DenseIndex;
use crate::structures::{ChunkedArray, IdIndex, SlotIndex};

/// One stored preference with both its ids and dense indexes.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct IndexedPreference {
    pub slot: SlotIndex,
    pub user: i64,
    pub item: i64,
    pub user_index: DenseIndex,
    pub item_index: DenseIndex,
    pub value: f64,
}

/// Immutable, densely packed preferences.
///
/// Slots `0..len` are all live. Safe to share between threads.
#[derive(Debug)]
pub struct PackedPreferenceData {
    users: ChunkedArray<DenseIndex>,
    items: ChunkedArray<DenseIndex>,
    values: ChunkedArray<f64>,
    len: u32,
    user_index: IdIndex,
    item_index: IdIndex,
}

impl PackedPreferenceData {
    pub(crate) fn new(
        users: ChunkedArray<DenseIndex>,
        items: ChunkedArray<DenseIndex>,
        values: ChunkedArray<f64>,
        len: u32,
        user_index: IdIndex,
        item_index: IdIndex,
    ) -> Self {
        Self {
            users,
            items,
            values,
            len,
            user_index,
            item_index,
        }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Preference at `slot`, or `None` past the end.
    pub fn preference(&self, slot: SlotIndex) -> Option<IndexedPreference> {
        if slot.get() >= self.len {
            return None;
        }
        let mut preference = IndexedPreference::default();
        self.read_into(slot, &mut preference);
        Some(preference)
    }

    /// Every preference in slot order
    pub fn ratings(&self) -> PreferenceCollection<'_> {
        PreferenceCollection {
            data: self,
            slots: Slots::All(self.len),
        }
    }

    pub fn user_index(&self) -> &IdIndex {
        &self.user_index
    }

    pub fn item_index(&self) -> &IdIndex {
        &self.item_index
    }

    /// Dense user index stored at `slot`
    #[inline]
    pub(crate) fn user_at(&self, slot: SlotIndex) -> DenseIndex {
        self.users.get(slot)
    }

    pub(crate) fn collection<'a>(&'a self, slots: &'a [u32]) -> PreferenceCollection<'a> {
        PreferenceCollection {
            data: self,
            slots: Slots::Listed(slots),
        }
    }

    #[inline]
    fn read_into(&self, slot: SlotIndex, out: &mut IndexedPreference) {
        let user_index = self.users.get(slot);
        let item_index = self.items.get(slot);
        out.slot = slot;
        out.user = self.user_index.id_of(user_index);
        out.item = self.item_index.id_of(item_index);
        out.user_index = user_index;
        out.item_index = item_index;
        out.value = self.values.get(slot);
    }
}

#[derive(Debug, Clone, Copy)]
enum Slots<'a> {
    /// `0..n`
    All(u32),
    Listed(&'a [u32]),
}

/// A view over some of the preferences in a [`PackedPreferenceData`].
///
/// [`iter`](Self::iter) yields owned values; [`cursor`](Self::cursor)
/// fills one reused value whose reference lasts until the next step.
#[derive(Debug, Clone, Copy)]
pub struct PreferenceCollection<'a> {
    data: &'a PackedPreferenceData,
    slots: Slots<'a>,
}

impl<'a> PreferenceCollection<'a> {
    pub fn len(&self) -> usize {
        match self.slots {
            Slots::All(n) => n as usize,
            Slots::Listed(slots) => slots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `i`-th preference, or `None` past the end.
    pub fn get(&self, i: usize) -> Option<IndexedPreference> {
        let slot = self.slot(i)?;
        let mut preference = IndexedPreference::default();
        self.data.read_into(slot, &mut preference);
        Some(preference)
    }

    pub fn iter(&self) -> PreferenceIter<'a> {
        PreferenceIter {
            collection: *self,
            next: 0,
        }
    }

    pub fn cursor(&self) -> PreferenceCursor<'a> {
        PreferenceCursor {
            collection: *self,
            next: 0,
            current: IndexedPreference::default(),
        }
    }

    #[inline]
    fn slot(&self, i: usize) -> Option<SlotIndex> {
        match self.slots {
            Slots::All(n) => (i < n as usize).then(|| SlotIndex::new(i as u32)),
            Slots::Listed(slots) => slots.get(i).map(|&s| SlotIndex::new(s)),
        }
    }
}

impl<'a> IntoIterator for PreferenceCollection<'a> {
    type Item = IndexedPreference;
    type IntoIter = PreferenceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owned-value iterator over a [`PreferenceCollection`]
pub struct PreferenceIter<'a> {
    collection: PreferenceCollection<'a>,
    next: usize,
}

impl Iterator for PreferenceIter<'_> {
    type Item = IndexedPreference;

    fn next(&mut self) -> Option<IndexedPreference> {
        let preference = self.collection.get(self.next)?;
        self.next += 1;
        Some(preference)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.collection.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PreferenceIter<'_> {}

/// Allocation-free cursor over a [`PreferenceCollection`].
pub struct PreferenceCursor<'a> {
    collection: PreferenceCollection<'a>,
    next: usize,
    current: IndexedPreference,
}

impl PreferenceCursor<'_> {
    /// Fill the reused preference with the next entry and return it.
    pub fn advance(&mut self) -> Option<&IndexedPreference> {
        let slot = self.collection.slot(self.next)?;
        self.collection.data.read_into(slot, &mut self.current);
        self.next += 1;
        Some(&self.current)
    }

    pub fn remaining(&self) -> usize {
        self.collection.len() - self.next
    }
}
