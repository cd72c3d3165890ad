//! Per-key index tables mapping a user or item id to its record positions.
//!
//! ```text
//! [entry × key count: key(i64) + offset(i32) + length(i32)]
//! [positions: Σ length × record index(i32)]
//! ```
//! Entry offsets are a running sum of the lengths written before them, so
//! `entry[0].offset == 0` and the last offset plus its length is the size of
//! the position array. Nothing else records where the table ends.

use std::io::Write;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use rustc_hash::FxHashMap;

use super::bytes::PackBytes;
use super::format::{INDEX_ENTRY_SIZE, POSITION_SIZE};
use crate::error::{Error, Result};

/// Write an index table for `map`, keys in ascending order.
///
/// Returns the number of bytes written.
pub fn write_index_table<W: Write + ?Sized>(
    writer: &mut W,
    map: &FxHashMap<i64, Vec<u32>>,
) -> Result<u64> {
    let mut keys: Vec<i64> = map.keys().copied().collect();
    keys.sort_unstable();

    let mut offset: u64 = 0;
    for &key in &keys {
        let length = map[&key].len() as u64;
        writer.write_i64::<BigEndian>(key)?;
        writer.write_i32::<BigEndian>(table_int(offset)?)?;
        writer.write_i32::<BigEndian>(table_int(length)?)?;
        offset += length;
    }
    for &key in &keys {
        for &position in &map[&key] {
            writer.write_i32::<BigEndian>(position as i32)?;
        }
    }

    Ok(keys.len() as u64 * INDEX_ENTRY_SIZE as u64 + offset * POSITION_SIZE as u64)
}

fn table_int(value: u64) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::Precondition(format!("index table offset {} overflows i32", value)))
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u32,
    length: u32,
}

/// Parsed index table. Positions stay in the backing bytes and are sliced per lookup.
#[derive(Debug, Clone)]
pub struct IndexTable {
    entries: FxHashMap<i64, IndexEntry>,
    positions: PackBytes,
}

impl IndexTable {
    /// Parse a table of `key_count` entries from the start of `bytes`.
    ///
    /// Verifies the running-offset invariant and that every position names
    /// one of `rating_count` records. Returns the table and its size in bytes.
    pub fn parse(bytes: &PackBytes, key_count: u32, rating_count: u32) -> Result<(Self, usize)> {
        let entries_size = key_count as usize * INDEX_ENTRY_SIZE;
        if bytes.len() < entries_size {
            return Err(Error::Corruption(format!(
                "index table needs {} entry bytes, {} available",
                entries_size,
                bytes.len()
            )));
        }

        let mut entries =
            FxHashMap::with_capacity_and_hasher(key_count as usize, Default::default());
        let mut expected: u64 = 0;
        for (i, raw) in bytes[..entries_size]
            .chunks_exact(INDEX_ENTRY_SIZE)
            .enumerate()
        {
            let key = BigEndian::read_i64(&raw[0..8]);
            let offset = BigEndian::read_i32(&raw[8..12]);
            let length = BigEndian::read_i32(&raw[12..16]);
            if offset < 0 || offset as u64 != expected {
                return Err(Error::Corruption(format!(
                    "entry {} (key {}) has offset {}, expected {}",
                    i, key, offset, expected
                )));
            }
            if length < 0 {
                return Err(Error::Corruption(format!(
                    "entry {} (key {}) has negative length {}",
                    i, key, length
                )));
            }
            let entry = IndexEntry {
                offset: offset as u32,
                length: length as u32,
            };
            if entries.insert(key, entry).is_some() {
                return Err(Error::Corruption(format!("duplicate index key {}", key)));
            }
            expected += length as u64;
        }

        let positions_size = expected as usize * POSITION_SIZE;
        let total = entries_size + positions_size;
        if bytes.len() < total {
            return Err(Error::Corruption(format!(
                "index table needs {} position bytes, {} available",
                positions_size,
                bytes.len() - entries_size
            )));
        }
        let positions = bytes.slice(entries_size..total);
        for raw in positions.chunks_exact(POSITION_SIZE) {
            let position = BigEndian::read_i32(raw);
            if position < 0 || position as u32 >= rating_count {
                return Err(Error::Corruption(format!(
                    "position {} outside {} records",
                    position, rating_count
                )));
            }
        }

        Ok((Self { entries, positions }, total))
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positions recorded for `key`, or `None` if the key never appeared.
    pub fn get(&self, key: i64) -> Option<Positions> {
        self.entries.get(&key).map(|entry| self.positions_of(entry))
    }

    /// Keys in no particular order
    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.keys().copied()
    }

    /// `(key, positions)` pairs in no particular order
    pub fn entries(&self) -> impl Iterator<Item = (i64, Positions)> + '_ {
        self.entries
            .iter()
            .map(|(&key, entry)| (key, self.positions_of(entry)))
    }

    /// Length of the shared position array
    pub fn total_positions(&self) -> usize {
        self.positions.len() / POSITION_SIZE
    }

    fn positions_of(&self, entry: &IndexEntry) -> Positions {
        let start = entry.offset as usize * POSITION_SIZE;
        let end = start + entry.length as usize * POSITION_SIZE;
        Positions {
            bytes: self.positions.slice(start..end),
        }
    }
}

/// Record positions belonging to one key, ascending by record index.
#[derive(Debug, Clone)]
pub struct Positions {
    bytes: PackBytes,
}

impl Positions {
    pub fn len(&self) -> usize {
        self.bytes.len() / POSITION_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> u32 {
        let start = i * POSITION_SIZE;
        BigEndian::read_i32(&self.bytes[start..start + POSITION_SIZE]) as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bytes
            .chunks_exact(POSITION_SIZE)
            .map(|raw| BigEndian::read_i32(raw) as u32)
    }
}
