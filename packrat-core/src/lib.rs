//! Packrat - packed rating storage for recommender toolkits
//!
//! Two read-only, repeatedly scannable stores built from a stream of
//! `(user, item, value, timestamp)` events:
//! - **Binary rating packs**: a write-once file of fixed-width records plus
//!   per-user and per-item index tables, read back through a memory map
//! - **Packed preference snapshots**: chunked in-memory columns with
//!   last-write-wins ingestion, slot reuse, compaction and shuffling
//!
//! Both expose owned iteration (each step yields an independent value) and
//! cursor iteration (one reused value, valid until the next step).

pub mod config;
pub mod error;
pub mod pack;
pub mod rating;
pub mod snapshot;
pub mod structures;

pub use config::{PackWriterConfig, SnapshotConfig};
pub use error::{Error, Result};
pub use pack::{
    BinaryFormat, FormatFlags, PackHeader, PackSummary, PackedRatings, RatingCursor, RatingIter,
    RatingList, RatingPacker,
};
pub use rating::{NO_TIMESTAMP, Preference, Rating};
pub use snapshot::{
    IndexedPreference, PackedPreferenceBuilder, PackedPreferenceData, PackedPreferenceSnapshot,
    PreferenceCollection, PreferenceCursor, PreferenceIter,
};
pub use structures::{ChunkedArray, IdIndex, SlotIndex};

/// Dense index assigned to a user or item id
pub type DenseIndex = u32;
