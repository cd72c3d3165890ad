//! User-indexed snapshot of the current preference state

use std::sync::OnceLock;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;

use super::builder::PackedPreferenceBuilder;
use super::data::{PackedPreferenceData, PreferenceCollection};
use crate::config::SnapshotConfig;
use crate::error::Result;
use crate::pack::PackedRatings;
use crate::rating::Rating;
use crate::structures::{IdIndex, SlotIndex};

/// Live preferences after replaying a rating event stream.
///
/// Each `(user, item)` pair keeps its last value; an unrate removes the
/// pair. Read-only and shareable between threads once built. The per-user
/// grouping is computed on first use and then reused.
#[derive(Debug)]
pub struct PackedPreferenceSnapshot {
    data: PackedPreferenceData,
    user_slots: OnceLock<Vec<Vec<u32>>>,
}

impl PackedPreferenceSnapshot {
    /// Replay `ratings` in timestamp order (arrival order among equal
    /// timestamps).
    pub fn from_ratings<I>(ratings: I, config: &SnapshotConfig) -> Result<Self>
    where
        I: IntoIterator<Item = Rating>,
    {
        let mut ratings: Vec<Rating> = ratings.into_iter().collect();
        if !ratings.is_sorted_by_key(|r| r.timestamp) {
            log::debug!("sorting {} ratings by timestamp", ratings.len());
            ratings.sort_by(Rating::cmp_timestamp);
        }

        let mut builder = PackedPreferenceBuilder::new(config.initial_chunk_count);
        // ids are interned only once a preference is stored
        let mut latest: FxHashMap<(i64, i64), SlotIndex> = FxHashMap::default();
        for rating in &ratings {
            let key = (rating.user, rating.item);
            match (latest.get(&key).copied(), rating.preference()) {
                (Some(slot), Some(preference)) => builder.set(slot, &preference)?,
                (Some(slot), None) => {
                    builder.release(slot)?;
                    latest.remove(&key);
                }
                (None, Some(preference)) => {
                    let slot = builder.add(&preference)?;
                    latest.insert(key, slot);
                }
                (None, None) => {}
            }
        }
        log::debug!(
            "replayed {} ratings into {} preferences of {} users",
            ratings.len(),
            builder.len(),
            builder.user_index().len()
        );

        if config.shuffle {
            let seed = config.seed.unwrap_or_else(rand::random);
            builder.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        Ok(Self::new(builder.build()))
    }

    /// Snapshot of the current state recorded in a pack.
    pub fn from_pack(pack: &PackedRatings, config: &SnapshotConfig) -> Result<Self> {
        Self::from_ratings(&pack.all_ratings(), config)
    }

    pub fn new(data: PackedPreferenceData) -> Self {
        Self {
            data,
            user_slots: OnceLock::new(),
        }
    }

    pub fn data(&self) -> &PackedPreferenceData {
        &self.data
    }

    /// Number of live preferences
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn ratings(&self) -> PreferenceCollection<'_> {
        self.data.ratings()
    }

    /// Preferences of `user` in slot order; empty if the user is unknown.
    pub fn user_ratings(&self, user: i64) -> PreferenceCollection<'_> {
        let slots: &[u32] = match self.data.user_index().index_of(user) {
            Some(index) => self.user_slots()[index as usize].as_slice(),
            None => &[],
        };
        self.data.collection(slots)
    }

    /// `(item, value)` pairs of `user`
    pub fn user_vector(&self, user: i64) -> Vec<(i64, f64)> {
        self.user_ratings(user)
            .iter()
            .map(|p| (p.item, p.value))
            .collect()
    }

    /// Every user id that had a stored preference, including users whose
    /// preferences were all withdrawn later
    pub fn user_ids(&self) -> &[i64] {
        self.data.user_index().ids()
    }

    pub fn item_ids(&self) -> &[i64] {
        self.data.item_index().ids()
    }

    pub fn user_index(&self) -> &IdIndex {
        self.data.user_index()
    }

    pub fn item_index(&self) -> &IdIndex {
        self.data.item_index()
    }

    fn user_slots(&self) -> &[Vec<u32>] {
        self.user_slots.get_or_init(|| {
            let mut groups: Vec<Vec<u32>> = vec![Vec::new(); self.data.user_index().len()];
            for slot in 0..self.data.len() as u32 {
                let user = self.data.user_at(SlotIndex::new(slot));
                groups[user as usize].push(slot);
            }
            log::debug!("grouped {} preferences by {} users", self.len(), groups.len());
            groups
        })
    }
}

impl From<PackedPreferenceData> for PackedPreferenceSnapshot {
    fn from(data: PackedPreferenceData) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PackWriterConfig;
    use crate::pack::pack;
    use crate::rating::{NO_TIMESTAMP, Preference};
    use tempfile::tempdir;

    fn seeded() -> SnapshotConfig {
        SnapshotConfig {
            seed: Some(11),
            ..SnapshotConfig::default()
        }
    }

    fn unshuffled() -> SnapshotConfig {
        SnapshotConfig {
            shuffle: false,
            ..SnapshotConfig::default()
        }
    }

    fn sorted_vector(snapshot: &PackedPreferenceSnapshot, user: i64) -> Vec<(i64, f64)> {
        let mut v = snapshot.user_vector(user);
        v.sort_by_key(|&(item, _)| item);
        v
    }

    #[test]
    fn test_unrate_removes_pair() {
        let ratings = vec![
            Rating::with_timestamp(1, 1, 3.0, 1),
            Rating::with_timestamp(1, 2, 5.0, 2),
            Rating::unrate(1, 1, 3),
        ];
        let snapshot = PackedPreferenceSnapshot::from_ratings(ratings, &seeded()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.user_vector(1), vec![(2, 5.0)]);
        assert_eq!(snapshot.item_ids(), &[1, 2]);
    }

    #[test]
    fn test_last_write_wins_in_timestamp_order() {
        let ratings = vec![
            Rating::with_timestamp(1, 1, 4.0, 20),
            Rating::with_timestamp(1, 1, 2.0, 10),
            Rating::with_timestamp(2, 1, 1.0, 5),
            Rating::with_timestamp(2, 1, 3.0, 5),
        ];
        let snapshot = PackedPreferenceSnapshot::from_ratings(ratings, &unshuffled()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.user_vector(1), vec![(1, 4.0)]);
        assert_eq!(snapshot.user_vector(2), vec![(1, 3.0)]);
    }

    #[test]
    fn test_rerate_after_unrate_reuses_slot() {
        let ratings = vec![
            Rating::new(1, 1, 1.0),
            Rating::new(1, 2, 2.0),
            Rating::unrate(1, 1, NO_TIMESTAMP),
            Rating::new(1, 3, 3.0),
            Rating::new(1, 1, 4.0),
        ];
        let snapshot = PackedPreferenceSnapshot::from_ratings(ratings, &unshuffled()).unwrap();
        assert_eq!(snapshot.len(), 3);
        let slots: Vec<(i64, u32)> = snapshot
            .ratings()
            .iter()
            .map(|p| (p.item, p.slot.get()))
            .collect();
        assert_eq!(slots, vec![(3, 0), (2, 1), (1, 2)]);
        assert_eq!(sorted_vector(&snapshot, 1), vec![(1, 4.0), (2, 2.0), (3, 3.0)]);
    }

    #[test]
    fn test_unknown_user_is_empty() {
        let ratings = vec![Rating::new(1, 1, 1.0), Rating::unrate(2, 9, NO_TIMESTAMP)];
        let snapshot = PackedPreferenceSnapshot::from_ratings(ratings, &unshuffled()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.user_ratings(99).is_empty());
        assert!(snapshot.user_vector(99).is_empty());
        // an unrate of a never-rated pair interns nothing
        assert_eq!(snapshot.user_ids(), &[1]);
        assert_eq!(snapshot.item_ids(), &[1]);
        assert!(!snapshot.user_index().contains(2));
        assert!(!snapshot.item_index().contains(9));
        assert!(snapshot.user_ratings(2).is_empty());
    }

    #[test]
    fn test_withdrawn_user_stays_indexed() {
        let ratings = vec![
            Rating::with_timestamp(1, 1, 1.0, 1),
            Rating::with_timestamp(2, 5, 2.0, 2),
            Rating::unrate(2, 5, 3),
        ];
        let snapshot = PackedPreferenceSnapshot::from_ratings(ratings, &seeded()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.user_ids(), &[1, 2]);
        assert_eq!(snapshot.item_ids(), &[1, 5]);
        assert!(snapshot.user_ratings(2).is_empty());
    }

    #[test]
    fn test_user_groups_cover_every_preference() {
        let ratings: Vec<Rating> = (0..5000)
            .map(|i| Rating::new(i % 37, i, (i % 5) as f64))
            .collect();
        let snapshot = PackedPreferenceSnapshot::from_ratings(ratings, &seeded()).unwrap();
        assert_eq!(snapshot.len(), 5000);

        let mut total = 0usize;
        for &user in snapshot.user_ids() {
            let group = snapshot.user_ratings(user);
            let mut cursor = group.cursor();
            while let Some(p) = cursor.advance() {
                assert_eq!(p.user, user);
                assert_eq!(p.item % 37, user);
                total += 1;
            }
        }
        assert_eq!(total, 5000);
    }

    #[test]
    fn test_same_seed_same_order() {
        let ratings: Vec<Rating> = (0..300).map(|i| Rating::new(i % 9, i, 1.0)).collect();
        let a = PackedPreferenceSnapshot::from_ratings(ratings.clone(), &seeded()).unwrap();
        let b = PackedPreferenceSnapshot::from_ratings(ratings, &seeded()).unwrap();
        let order =
            |s: &PackedPreferenceSnapshot| s.ratings().iter().map(|p| p.item).collect::<Vec<_>>();
        assert_eq!(order(&a), order(&b));
    }

    #[test]
    fn test_concurrent_first_access() {
        let ratings: Vec<Rating> = (0..2000).map(|i| Rating::new(i % 13, i, 2.0)).collect();
        let snapshot = PackedPreferenceSnapshot::from_ratings(ratings, &seeded()).unwrap();

        let counts: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|t| {
                    let snapshot = &snapshot;
                    s.spawn(move || snapshot.user_ratings(t % 13).len())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (t, count) in counts.into_iter().enumerate() {
            let expected = (0..2000).filter(|i| i % 13 == t as i64 % 13).count();
            assert_eq!(count, expected);
        }
    }

    #[test]
    fn test_from_pack_matches_live_view() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.pack");
        let ratings = vec![
            Rating::with_timestamp(1, 1, 3.0, 1),
            Rating::with_timestamp(1, 2, 5.0, 2),
            Rating::with_timestamp(2, 1, 4.0, 4),
            Rating::unrate(1, 1, 3),
        ];
        pack(&path, &PackWriterConfig::with_timestamps(), ratings).unwrap();
        let packed = PackedRatings::open(&path).unwrap();

        let snapshot = PackedPreferenceSnapshot::from_pack(&packed, &seeded()).unwrap();
        assert_eq!(snapshot.len(), 2);
        for user in [1, 2] {
            let live: Vec<(i64, f64)> = packed
                .live_ratings_for_user(user)
                .unwrap()
                .iter()
                .map(|r| (r.item, r.value.unwrap_or(f64::NAN)))
                .collect();
            assert_eq!(sorted_vector(&snapshot, user), live);
        }
    }

    #[test]
    fn test_snapshot_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PackedPreferenceSnapshot>();
    }

    #[test]
    fn test_snapshot_from_built_data() {
        let mut builder = PackedPreferenceBuilder::default();
        for i in 0..10 {
            builder.add(&Preference::new(i, i * 2, 1.0)).unwrap();
        }
        let snapshot = PackedPreferenceSnapshot::from(builder.build());
        assert_eq!(snapshot.user_vector(3), vec![(6, 1.0)]);
    }
}
