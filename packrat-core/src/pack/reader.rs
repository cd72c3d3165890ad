//! Memory-mapped binary pack reader

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use rustc_hash::{FxHashMap, FxHashSet};

use super::bytes::PackBytes;
use super::format::{BinaryFormat, HEADER_SIZE};
use super::header::PackHeader;
use super::index_table::IndexTable;
use super::list::RatingList;
use crate::error::{Error, Result};
use crate::rating::Rating;

/// Read-only view of a finished pack.
///
/// Cheap to clone and safe to share between threads: all state is immutable
/// and backed by one reference-counted mapping. Lookups of keys that never
/// appeared return `None`; keys that appeared always return a list.
#[derive(Debug, Clone)]
pub struct PackedRatings {
    header: PackHeader,
    records: PackBytes,
    users: IndexTable,
    items: IndexTable,
}

impl PackedRatings {
    /// Open and memory-map the pack at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        // reject foreign files before mapping anything
        let header = PackHeader::read(&mut file)?;
        log::info!(
            "loading pack {} with {} ratings of {} items from {} users",
            path.display(),
            header.rating_count(),
            header.item_count(),
            header.user_count()
        );

        // SAFETY: packs are write-once; nothing writes the file while it is mapped.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::load(PackBytes::from_mmap(mmap))
    }

    /// Read a pack held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::load(PackBytes::from_vec(data))
    }

    fn load(bytes: PackBytes) -> Result<Self> {
        let header = PackHeader::from_bytes(&bytes)?;
        let data_end = HEADER_SIZE + header.rating_data_size();
        if bytes.len() < data_end {
            return Err(Error::Format(format!(
                "pack is {} bytes but its records end at {}",
                bytes.len(),
                data_end
            )));
        }
        let records = bytes.slice(HEADER_SIZE..data_end);

        let tables = bytes.slice(data_end..bytes.len());
        let (users, user_size) =
            IndexTable::parse(&tables, header.user_count(), header.rating_count())?;
        let rest = tables.slice(user_size..tables.len());
        let (items, _) = IndexTable::parse(&rest, header.item_count(), header.rating_count())?;

        Ok(Self {
            header,
            records,
            users,
            items,
        })
    }

    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    pub fn format(&self) -> BinaryFormat {
        self.header.format()
    }

    /// Number of rating records
    pub fn len(&self) -> usize {
        self.header.rating_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Every record in file order (timestamp order for timestamped packs).
    pub fn all_ratings(&self) -> RatingList {
        RatingList::all(self.format(), self.records.clone(), self.header.rating_count())
    }

    /// Every record for `user`, or `None` if the user never appeared.
    pub fn ratings_for_user(&self, user: i64) -> Option<RatingList> {
        self.users
            .get(user)
            .map(|p| RatingList::keyed(self.format(), self.records.clone(), p))
    }

    /// Every record for `item`, or `None` if the item never appeared.
    pub fn ratings_for_item(&self, item: i64) -> Option<RatingList> {
        self.items
            .get(item)
            .map(|p| RatingList::keyed(self.format(), self.records.clone(), p))
    }

    /// User ids in no particular order
    pub fn user_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.users.keys()
    }

    /// Item ids in no particular order
    pub fn item_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.items.keys()
    }

    /// Users with at least one record for `item`
    pub fn users_for_item(&self, item: i64) -> Option<FxHashSet<i64>> {
        let list = self.ratings_for_item(item)?;
        Some(list.iter().map(|r| r.user).collect())
    }

    /// Items with at least one record for `user`
    pub fn items_for_user(&self, user: i64) -> Option<FxHashSet<i64>> {
        let list = self.ratings_for_user(user)?;
        Some(list.iter().map(|r| r.item).collect())
    }

    /// `(user, records)` groups in no particular order
    pub fn by_user(&self) -> impl Iterator<Item = (i64, RatingList)> + '_ {
        self.users.entries().map(|(user, p)| {
            (
                user,
                RatingList::keyed(self.format(), self.records.clone(), p),
            )
        })
    }

    /// `(item, records)` groups in no particular order
    pub fn by_item(&self) -> impl Iterator<Item = (i64, RatingList)> + '_ {
        self.items.entries().map(|(item, p)| {
            (
                item,
                RatingList::keyed(self.format(), self.records.clone(), p),
            )
        })
    }

    /// Current ratings of `user`: the last event per item, without unrates.
    ///
    /// `None` if the user never appeared; an empty vector if every rating
    /// was withdrawn.
    pub fn live_ratings_for_user(&self, user: i64) -> Option<Vec<Rating>> {
        let list = self.ratings_for_user(user)?;
        Some(latest_events(&list, |r| r.item))
    }

    /// Current ratings of `item`: the last event per user, without unrates.
    pub fn live_ratings_for_item(&self, item: i64) -> Option<Vec<Rating>> {
        let list = self.ratings_for_item(item)?;
        Some(latest_events(&list, |r| r.user))
    }
}

/// Keep the last event per key in record order, then drop unrates.
fn latest_events(list: &RatingList, key: impl Fn(&Rating) -> i64) -> Vec<Rating> {
    let mut latest: FxHashMap<i64, (usize, Rating)> = FxHashMap::default();
    let mut cursor = list.cursor();
    let mut i = 0;
    while let Some(rating) = cursor.advance() {
        latest.insert(key(rating), (i, *rating));
        i += 1;
    }

    let mut live: Vec<(usize, Rating)> = latest
        .into_values()
        .filter(|(_, r)| !r.is_unrate())
        .collect();
    live.sort_unstable_by_key(|(i, _)| *i);
    live.into_iter().map(|(_, r)| r).collect()
}
