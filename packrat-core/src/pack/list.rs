//! Rating lists over the record region of a pack.

use super::bytes::PackBytes;
use super::format::BinaryFormat;
use super::index_table::Positions;
use crate::rating::Rating;

#[derive(Debug, Clone)]
enum PositionList {
    /// Every record, `0..n`
    All(u32),
    Keyed(Positions),
}

/// Ratings at a list of record positions, decoded on access.
///
/// Two ways to iterate:
/// - [`iter`](Self::iter) yields independent `Rating` values
/// - [`cursor`](Self::cursor) decodes into one reused `Rating`; each
///   reference it hands out lives only until the next `advance`
#[derive(Debug, Clone)]
pub struct RatingList {
    format: BinaryFormat,
    records: PackBytes,
    positions: PositionList,
}

impl RatingList {
    pub(crate) fn all(format: BinaryFormat, records: PackBytes, count: u32) -> Self {
        Self {
            format,
            records,
            positions: PositionList::All(count),
        }
    }

    pub(crate) fn keyed(format: BinaryFormat, records: PackBytes, positions: Positions) -> Self {
        Self {
            format,
            records,
            positions: PositionList::Keyed(positions),
        }
    }

    pub fn len(&self) -> usize {
        match &self.positions {
            PositionList::All(n) => *n as usize,
            PositionList::Keyed(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record index of the `i`-th rating in this list
    #[inline]
    pub fn position(&self, i: usize) -> u32 {
        match &self.positions {
            PositionList::All(_) => i as u32,
            PositionList::Keyed(p) => p.get(i),
        }
    }

    /// The `i`-th rating, or `None` past the end.
    pub fn get(&self, i: usize) -> Option<Rating> {
        (i < self.len()).then(|| self.format.read_rating(self.record(self.position(i))))
    }

    pub fn iter(&self) -> RatingIter<'_> {
        RatingIter {
            list: self,
            next: 0,
        }
    }

    pub fn cursor(&self) -> RatingCursor<'_> {
        RatingCursor {
            list: self,
            next: 0,
            current: Rating::default(),
        }
    }

    /// Collect owned ratings
    pub fn to_vec(&self) -> Vec<Rating> {
        self.iter().collect()
    }

    #[inline]
    fn record(&self, position: u32) -> &[u8] {
        let size = self.format.record_size();
        let start = position as usize * size;
        &self.records[start..start + size]
    }
}

impl<'a> IntoIterator for &'a RatingList {
    type Item = Rating;
    type IntoIter = RatingIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owned-value iterator over a [`RatingList`]
pub struct RatingIter<'a> {
    list: &'a RatingList,
    next: usize,
}

impl Iterator for RatingIter<'_> {
    type Item = Rating;

    fn next(&mut self) -> Option<Rating> {
        let rating = self.list.get(self.next)?;
        self.next += 1;
        Some(rating)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.list.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RatingIter<'_> {}

/// Allocation-free cursor over a [`RatingList`].
///
/// The returned reference borrows the cursor mutably, so it cannot be held
/// across the next step.
pub struct RatingCursor<'a> {
    list: &'a RatingList,
    next: usize,
    current: Rating,
}

impl RatingCursor<'_> {
    /// Decode the next rating in place and return it.
    pub fn advance(&mut self) -> Option<&Rating> {
        if self.next >= self.list.len() {
            return None;
        }
        let position = self.list.position(self.next);
        self.list
            .format
            .read_rating_into(self.list.record(position), &mut self.current);
        self.next += 1;
        Some(&self.current)
    }

    pub fn remaining(&self) -> usize {
        self.list.len() - self.next
    }
}
