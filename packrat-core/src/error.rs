//! Error types for packrat

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Pack corruption: {0}")]
    Corruption(String),

    #[error("Index {index} out of range for size {size}")]
    IndexOutOfRange { index: u32, size: u32 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Preference storage is full")]
    CapacityExhausted,
}

pub type Result<T> = std::result::Result<T, Error>;
