//! Binary rating packs: a write-once file format with memory-mapped reads.

mod bytes;
mod format;
mod header;
mod index_table;
mod list;
mod reader;
mod sort;
mod writer;


pub use bytes::PackBytes;
pub use format::{
    BinaryFormat, FormatFlags, HEADER_MAGIC, HEADER_SIZE, INDEX_ENTRY_SIZE, POSITION_SIZE,
};
pub use header::PackHeader;
pub use index_table::{IndexTable, Positions, write_index_table};
pub use list::{RatingCursor, RatingIter, RatingList};
pub use reader::PackedRatings;
pub use sort::{SortAccess, quick_sort};
pub use writer::{PackSummary, RatingPacker, pack};
