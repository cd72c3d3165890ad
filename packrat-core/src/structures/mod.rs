//! Storage structures for in-memory preference data

mod chunked;
mod id_index;

pub use chunked::{CHUNK_MASK, CHUNK_SHIFT, CHUNK_SIZE, ChunkedArray, SlotIndex, chunks_for};
pub use id_index::IdIndex;
