//! Configuration for pack writers and preference snapshots

use serde::{Deserialize, Serialize};

/// Configuration for [`RatingPacker`](crate::pack::RatingPacker)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackWriterConfig {
    /// Store a timestamp with every record (and sort the pack by it)
    pub timestamps: bool,
    /// Start with 32-bit user/item id columns; widened on the first id that
    /// does not fit
    pub compact_ids: bool,
    /// Write buffer size for the record region
    pub buffer_size: usize,
}

impl Default for PackWriterConfig {
    fn default() -> Self {
        Self {
            timestamps: false,
            compact_ids: true,
            buffer_size: 64 * 1024,
        }
    }
}

impl PackWriterConfig {
    pub fn with_timestamps() -> Self {
        Self {
            timestamps: true,
            ..Self::default()
        }
    }
}

/// Configuration for [`PackedPreferenceSnapshot`](crate::snapshot::PackedPreferenceSnapshot)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Chunk directory capacity allocated up front
    pub initial_chunk_count: usize,
    /// Randomize the physical order of preferences before freezing
    pub shuffle: bool,
    /// Shuffle seed; a random seed is drawn when unset
    pub seed: Option<u64>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            initial_chunk_count: 512,
            shuffle: true,
            seed: None,
        }
    }
}
