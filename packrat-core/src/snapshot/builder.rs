//! Mutable builder for packed in-memory preferences
//!
//! Preferences live in three parallel chunked columns (user index, item
//! index, value). Released slots go to a min-heap and are handed out again
//! lowest first, which keeps the live region dense; `repack` closes any
//! holes that remain before the arrays are frozen.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rand::Rng;

use super::data::PackedPreferenceData;
use crate::DenseIndex;
use crate::error::{Error, Result};
use crate::rating::Preference;
use crate::structures::{CHUNK_MASK, CHUNK_SIZE, ChunkedArray, IdIndex, SlotIndex, chunks_for};

/// Builds a [`PackedPreferenceData`] one preference at a time.
///
/// Single-threaded; freeze with [`build`](Self::build) before sharing.
#[derive(Debug)]
pub struct PackedPreferenceBuilder {
    users: ChunkedArray<DenseIndex>,
    items: ChunkedArray<DenseIndex>,
    values: ChunkedArray<f64>,
    /// Logical size, free slots included
    size: u32,
    free: BinaryHeap<Reverse<SlotIndex>>,
    user_index: IdIndex,
    item_index: IdIndex,
}

impl Default for PackedPreferenceBuilder {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PackedPreferenceBuilder {
    /// Builder whose chunk directory starts with `initial_chunk_count` entries.
    pub fn new(initial_chunk_count: usize) -> Self {
        Self {
            users: ChunkedArray::with_chunks(initial_chunk_count),
            items: ChunkedArray::with_chunks(initial_chunk_count),
            values: ChunkedArray::with_chunks(initial_chunk_count),
            size: 0,
            free: BinaryHeap::new(),
            user_index: IdIndex::new(),
            item_index: IdIndex::new(),
        }
    }

    /// Store `preference` in the lowest free slot, or append it.
    pub fn add(&mut self, preference: &Preference) -> Result<SlotIndex> {
        let slot = match self.free.pop() {
            Some(Reverse(slot)) => slot,
            None => {
                if self.size == SlotIndex::MAX.get() {
                    return Err(Error::CapacityExhausted);
                }
                let slot = SlotIndex::new(self.size);
                while slot.chunk() >= self.users.chunk_count() {
                    self.grow();
                }
                self.size += 1;
                slot
            }
        };
        self.store(slot, preference);
        Ok(slot)
    }

    /// Overwrite the preference at `slot`.
    ///
    /// Only checks `slot` against the logical size; overwriting a released
    /// slot is not detected.
    pub fn set(&mut self, slot: SlotIndex, preference: &Preference) -> Result<()> {
        self.check_slot(slot)?;
        self.store(slot, preference);
        Ok(())
    }

    /// Mark `slot` free for reuse. Its contents stay until overwritten or
    /// repacked away.
    ///
    /// Each slot may be released once between reuses.
    pub fn release(&mut self, slot: SlotIndex) -> Result<()> {
        self.check_slot(slot)?;
        self.free.push(Reverse(slot));
        Ok(())
    }

    /// Preference currently stored at `slot`, released or not.
    pub fn get(&self, slot: SlotIndex) -> Option<Preference> {
        (slot.get() < self.size).then(|| {
            Preference::new(
                self.user_index.id_of(self.users.get(slot)),
                self.item_index.id_of(self.items.get(slot)),
                self.values.get(slot),
            )
        })
    }

    /// Number of live preferences
    pub fn len(&self) -> usize {
        self.size as usize - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical size including released slots
    pub fn logical_size(&self) -> u32 {
        self.size
    }

    pub fn capacity_chunks(&self) -> usize {
        self.users.chunk_count()
    }

    /// Slots backed by allocated storage in each column
    pub fn allocated_slots(&self) -> usize {
        self.users.allocated_elements()
    }

    pub fn user_index(&self) -> &IdIndex {
        &self.user_index
    }

    pub fn item_index(&self) -> &IdIndex {
        &self.item_index
    }

    /// Fill every released slot with the current last preference.
    ///
    /// Free slots are handled highest first, so the last logical slot is
    /// always live when it is moved. Slot assignments change; the set of
    /// live preferences does not.
    pub fn repack(&mut self) {
        if self.free.is_empty() {
            return;
        }
        let mut free: Vec<SlotIndex> = std::mem::take(&mut self.free)
            .into_iter()
            .map(|Reverse(slot)| slot)
            .collect();
        free.sort_unstable_by(|a, b| b.cmp(a));

        let released = free.len();
        for slot in free {
            let last = SlotIndex::new(self.size - 1);
            if slot != last {
                self.users.set(slot, self.users.get(last));
                self.items.set(slot, self.items.get(last));
                self.values.set(slot, self.values.get(last));
            }
            self.size -= 1;
        }
        log::debug!(
            "repacked {} released slots, {} preferences remain",
            released,
            self.size
        );
    }

    /// Shrink storage to exactly the current logical size.
    ///
    /// Meant to follow [`repack`](Self::repack); released slots below the
    /// logical size are kept.
    pub fn trim(&mut self) {
        let chunk_count = chunks_for(self.size);
        let tail = match self.size & CHUNK_MASK {
            0 => CHUNK_SIZE,
            n => n as usize,
        };
        self.users.allocate(chunk_count);
        self.users.trim_last(tail);
        self.items.allocate(chunk_count);
        self.items.trim_last(tail);
        self.values.allocate(chunk_count);
        self.values.trim_last(tail);
    }

    /// Randomly permute the live preferences (repacking first).
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.repack();
        for i in (1..self.size).rev() {
            let j = rng.random_range(0..=i);
            if i != j {
                self.swap(SlotIndex::new(i), SlotIndex::new(j));
            }
        }
    }

    /// Repack, trim and freeze.
    pub fn build(mut self) -> PackedPreferenceData {
        self.repack();
        self.trim();
        PackedPreferenceData::new(
            self.users,
            self.items,
            self.values,
            self.size,
            self.user_index,
            self.item_index,
        )
    }

    fn check_slot(&self, slot: SlotIndex) -> Result<()> {
        if slot.get() >= self.size {
            return Err(Error::IndexOutOfRange {
                index: slot.get(),
                size: self.size,
            });
        }
        Ok(())
    }

    fn grow(&mut self) {
        self.users.grow();
        self.items.grow();
        self.values.grow();
    }

    fn store(&mut self, slot: SlotIndex, preference: &Preference) {
        let user = self.user_index.intern(preference.user);
        let item = self.item_index.intern(preference.item);
        let chunk = slot.chunk();
        self.users.ensure_chunk(chunk);
        self.items.ensure_chunk(chunk);
        self.values.ensure_chunk(chunk);
        self.users.set(slot, user);
        self.items.set(slot, item);
        self.values.set(slot, preference.value);
    }

    fn swap(&mut self, a: SlotIndex, b: SlotIndex) {
        self.users.swap(a, b);
        self.items.swap(a, b);
        self.values.swap(a, b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    fn pref(user: i64, item: i64, value: f64) -> Preference {
        Preference::new(user, item, value)
    }

    fn contents(data: &PackedPreferenceData) -> Vec<(i64, i64, u64)> {
        let mut out: Vec<_> = data
            .ratings()
            .iter()
            .map(|p| (p.user, p.item, p.value.to_bits()))
            .collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_add_reuses_lowest_free_slot() {
        let mut builder = PackedPreferenceBuilder::new(1);
        for i in 0..5 {
            builder.add(&pref(i, i, 1.0)).unwrap();
        }
        builder.release(SlotIndex::new(3)).unwrap();
        builder.release(SlotIndex::new(1)).unwrap();
        assert_eq!(builder.len(), 3);

        assert_eq!(builder.add(&pref(9, 9, 2.0)).unwrap(), SlotIndex::new(1));
        assert_eq!(builder.add(&pref(8, 8, 2.0)).unwrap(), SlotIndex::new(3));
        assert_eq!(builder.add(&pref(7, 7, 2.0)).unwrap(), SlotIndex::new(5));
        assert_eq!(builder.get(SlotIndex::new(1)), Some(pref(9, 9, 2.0)));
    }

    #[test]
    fn test_out_of_range_slots_rejected() {
        let mut builder = PackedPreferenceBuilder::new(1);
        builder.add(&pref(1, 1, 1.0)).unwrap();
        assert!(matches!(
            builder.release(SlotIndex::new(1)),
            Err(Error::IndexOutOfRange { index: 1, size: 1 })
        ));
        assert!(matches!(
            builder.set(SlotIndex::new(7), &pref(1, 1, 1.0)),
            Err(Error::IndexOutOfRange { .. })
        ));
        builder.set(SlotIndex::new(0), &pref(1, 2, 4.0)).unwrap();
        assert_eq!(builder.get(SlotIndex::new(0)), Some(pref(1, 2, 4.0)));
    }

    #[test]
    fn test_grows_across_chunks() {
        let mut builder = PackedPreferenceBuilder::new(1);
        let n = CHUNK_SIZE as i64 * 2 + 10;
        for i in 0..n {
            builder.add(&pref(i % 7, i, i as f64)).unwrap();
        }
        assert_eq!(builder.capacity_chunks(), 4);
        let data = builder.build();
        assert_eq!(data.len(), n as usize);
        let last = data.preference(SlotIndex::new(n as u32 - 1)).unwrap();
        assert_eq!(last.item, n - 1);
        assert_eq!(last.value, (n - 1) as f64);
    }

    #[test]
    fn test_repack_preserves_contents_for_any_release_order() {
        let n = CHUNK_SIZE as u32 + 100;
        let all: Vec<u32> = (0..n).collect();
        for seed in 0..4 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut builder = PackedPreferenceBuilder::new(1);
            for i in 0..n {
                builder.add(&pref(i as i64 % 13, i as i64, i as f64)).unwrap();
            }

            let mut released = all.clone();
            released.shuffle(&mut rng);
            released.truncate(n as usize / 3);
            for &slot in &released {
                builder.release(SlotIndex::new(slot)).unwrap();
            }

            let mut expected: Vec<(i64, i64, u64)> = all
                .iter()
                .filter(|&&i| !released.contains(&i))
                .map(|&i| (i as i64 % 13, i as i64, (i as f64).to_bits()))
                .collect();
            expected.sort_unstable();

            builder.repack();
            assert_eq!(builder.logical_size() as usize, expected.len());
            let data = builder.build();
            assert_eq!(contents(&data), expected);
        }
    }

    #[test]
    fn test_trim_then_add_reextends_last_chunk() {
        let mut builder = PackedPreferenceBuilder::new(4);
        for i in 0..10 {
            builder.add(&pref(1, i, 1.0)).unwrap();
        }
        assert_eq!(builder.allocated_slots(), CHUNK_SIZE);
        builder.trim();
        assert_eq!(builder.capacity_chunks(), 1);
        assert_eq!(builder.allocated_slots(), 10);
        builder.add(&pref(1, 10, 3.0)).unwrap();
        assert_eq!(builder.allocated_slots(), CHUNK_SIZE);
        assert_eq!(builder.get(SlotIndex::new(10)), Some(pref(1, 10, 3.0)));
        assert_eq!(builder.get(SlotIndex::new(9)), Some(pref(1, 9, 1.0)));
    }

    #[test]
    fn test_shuffle_is_reproducible_permutation() {
        let build = |seed: u64| {
            let mut builder = PackedPreferenceBuilder::new(1);
            for i in 0..200 {
                builder.add(&pref(i % 5, i, i as f64 / 2.0)).unwrap();
            }
            builder.release(SlotIndex::new(17)).unwrap();
            builder.shuffle(&mut StdRng::seed_from_u64(seed));
            builder.build()
        };

        let a = build(7);
        let b = build(7);
        let order = |d: &PackedPreferenceData| d.ratings().iter().map(|p| p.item).collect::<Vec<_>>();
        assert_eq!(order(&a), order(&b));
        assert_ne!(order(&a), (0..200).filter(|&i| i != 17).collect::<Vec<i64>>());

        let mut expected: Vec<(i64, i64, u64)> = (0..200)
            .filter(|&i| i != 17)
            .map(|i| (i % 5, i, (i as f64 / 2.0).to_bits()))
            .collect();
        expected.sort_unstable();
        assert_eq!(contents(&a), expected);
    }
}
