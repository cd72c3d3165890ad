//! Packed in-memory preference snapshots
//!
//! A [`PackedPreferenceBuilder`] collects preferences into chunked columns,
//! [`PackedPreferenceData`] is its frozen form and
//! [`PackedPreferenceSnapshot`] adds per-user lookup on top.

mod builder;
mod data;
mod store;

pub use builder::PackedPreferenceBuilder;
pub use data::{
    IndexedPreference, PackedPreferenceData, PreferenceCollection, PreferenceCursor,
    PreferenceIter,
};
pub use store::PackedPreferenceSnapshot;
