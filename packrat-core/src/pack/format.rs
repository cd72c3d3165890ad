//! Binary rating pack format: constants, format flags and the record codec.
//!
//! A pack file is laid out as:
//! ```text
//! [header: magic "LK"(2) + flag word(i16) + rating count(i32) + user count(i32) + item count(i32)]
//! [records: rating count × record]
//! [user index table] [item index table]
//! ```
//! A record is `user | item | value(f64, NaN = unrate) | [timestamp(i64)]`.
//! User and item ids are i64, or i32 when the matching compact flag is set.
//! All multi-byte values are big-endian.

use std::fmt;
use std::io::{self, Write};
use std::ops::BitOr;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::config::PackWriterConfig;
use crate::error::{Error, Result};
use crate::rating::{NO_TIMESTAMP, Rating};

/// Magic bytes at the start of every pack file
pub const HEADER_MAGIC: [u8; 2] = *b"LK";

/// Header size: magic(2) + flags(2) + 3 counts(4) = 16 bytes
pub const HEADER_SIZE: usize = 16;

const INT_SIZE: usize = 4;
const LONG_SIZE: usize = 8;
const DOUBLE_SIZE: usize = 8;

/// Index table entry: key(i64) + offset(i32) + length(i32)
pub const INDEX_ENTRY_SIZE: usize = LONG_SIZE + 2 * INT_SIZE;

/// Size of one record position in an index table
pub const POSITION_SIZE: usize = INT_SIZE;

/// Set of pack header flags, stored as the header's flag word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FormatFlags(u16);

impl FormatFlags {
    /// Records carry a timestamp
    pub const TIMESTAMPS: Self = Self(1);
    /// User ids are stored as i32
    pub const COMPACT_USERS: Self = Self(1 << 1);
    /// Item ids are stored as i32
    pub const COMPACT_ITEMS: Self = Self(1 << 2);

    const KNOWN_BITS: u16 = 0b111;

    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Parse a header flag word. Bits beyond the known flags are a format error.
    pub fn from_word(word: i16) -> Result<Self> {
        let bits = word as u16;
        if bits & !Self::KNOWN_BITS != 0 {
            return Err(Error::Format(format!("unparseable flag word {:#x}", bits)));
        }
        Ok(Self(bits))
    }

    pub fn word(self) -> i16 {
        self.0 as i16
    }
}

impl BitOr for FormatFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for FormatFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        if self.contains(Self::TIMESTAMPS) {
            set.entry(&"TIMESTAMPS");
        }
        if self.contains(Self::COMPACT_USERS) {
            set.entry(&"COMPACT_USERS");
        }
        if self.contains(Self::COMPACT_ITEMS) {
            set.entry(&"COMPACT_ITEMS");
        }
        set.finish()
    }
}

/// Record layout of a pack, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFormat {
    flags: FormatFlags,
    user_size: usize,
    item_size: usize,
    record_size: usize,
}

impl BinaryFormat {
    pub fn new(flags: FormatFlags) -> Self {
        let user_size = if flags.contains(FormatFlags::COMPACT_USERS) {
            INT_SIZE
        } else {
            LONG_SIZE
        };
        let item_size = if flags.contains(FormatFlags::COMPACT_ITEMS) {
            INT_SIZE
        } else {
            LONG_SIZE
        };
        let mut record_size = user_size + item_size + DOUBLE_SIZE;
        if flags.contains(FormatFlags::TIMESTAMPS) {
            record_size += LONG_SIZE;
        }
        Self {
            flags,
            user_size,
            item_size,
            record_size,
        }
    }

    pub fn from_config(config: &PackWriterConfig) -> Self {
        let mut flags = FormatFlags::empty();
        if config.timestamps {
            flags = flags | FormatFlags::TIMESTAMPS;
        }
        if config.compact_ids {
            flags = flags | FormatFlags::COMPACT_USERS | FormatFlags::COMPACT_ITEMS;
        }
        Self::new(flags)
    }

    pub fn from_flag_word(word: i16) -> Result<Self> {
        Ok(Self::new(FormatFlags::from_word(word)?))
    }

    pub fn flags(&self) -> FormatFlags {
        self.flags
    }

    pub fn flag_word(&self) -> i16 {
        self.flags.word()
    }

    #[inline]
    pub fn has_timestamps(&self) -> bool {
        self.flags.contains(FormatFlags::TIMESTAMPS)
    }

    #[inline]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Byte offset of a record, counted from the start of the file
    #[inline]
    pub fn record_position(&self, index: u32) -> u64 {
        HEADER_SIZE as u64 + index as u64 * self.record_size as u64
    }

    /// Whether `rating`'s ids fit in this layout
    pub fn accepts(&self, rating: &Rating) -> bool {
        let user_ok = self.user_size == LONG_SIZE || i32::try_from(rating.user).is_ok();
        let item_ok = self.item_size == LONG_SIZE || i32::try_from(rating.item).is_ok();
        user_ok && item_ok
    }

    /// The narrowest layout at least as wide as this one that accepts `rating`.
    pub fn widened_for(&self, rating: &Rating) -> Self {
        let mut flags = self.flags;
        if i32::try_from(rating.user).is_err() {
            flags = flags.difference(FormatFlags::COMPACT_USERS);
        }
        if i32::try_from(rating.item).is_err() {
            flags = flags.difference(FormatFlags::COMPACT_ITEMS);
        }
        Self::new(flags)
    }

    /// True if every record of `other` can be rewritten in this layout without loss.
    pub fn is_widening_of(&self, other: &BinaryFormat) -> bool {
        self.has_timestamps() == other.has_timestamps()
            && self.user_size >= other.user_size
            && self.item_size >= other.item_size
    }

    /// Encode one record.
    pub fn write_rating<W: Write + ?Sized>(&self, rating: &Rating, out: &mut W) -> io::Result<()> {
        if self.user_size == INT_SIZE {
            out.write_i32::<BigEndian>(compact_id(rating.user, "user")?)?;
        } else {
            out.write_i64::<BigEndian>(rating.user)?;
        }
        if self.item_size == INT_SIZE {
            out.write_i32::<BigEndian>(compact_id(rating.item, "item")?)?;
        } else {
            out.write_i64::<BigEndian>(rating.item)?;
        }
        out.write_f64::<BigEndian>(rating.value.unwrap_or(f64::NAN))?;
        if self.has_timestamps() {
            out.write_i64::<BigEndian>(rating.timestamp)?;
        }
        Ok(())
    }

    /// Decode the record starting at `bytes[0]`.
    ///
    /// `bytes` must hold at least [`record_size`](Self::record_size) bytes.
    pub fn read_rating(&self, bytes: &[u8]) -> Rating {
        let mut rating = Rating::default();
        self.read_rating_into(bytes, &mut rating);
        rating
    }

    /// Decode the record starting at `bytes[0]` into an existing rating.
    pub fn read_rating_into(&self, bytes: &[u8], rating: &mut Rating) {
        let mut pos = 0;
        rating.user = if self.user_size == INT_SIZE {
            BigEndian::read_i32(&bytes[pos..]) as i64
        } else {
            BigEndian::read_i64(&bytes[pos..])
        };
        pos += self.user_size;
        rating.item = if self.item_size == INT_SIZE {
            BigEndian::read_i32(&bytes[pos..]) as i64
        } else {
            BigEndian::read_i64(&bytes[pos..])
        };
        pos += self.item_size;
        let value = BigEndian::read_f64(&bytes[pos..]);
        rating.value = if value.is_nan() { None } else { Some(value) };
        pos += DOUBLE_SIZE;
        rating.timestamp = if self.has_timestamps() {
            BigEndian::read_i64(&bytes[pos..])
        } else {
            NO_TIMESTAMP
        };
    }
}

fn compact_id(id: i64, what: &str) -> io::Result<i32> {
    i32::try_from(id).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} id {} does not fit a compact column", what, id),
        )
    })
}

impl fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinaryFormat{:?}", self.flags)
    }
}
