//! Rating events and preferences

use std::cmp::Ordering;

/// Timestamp recorded for ratings that carry none
pub const NO_TIMESTAMP: i64 = -1;

/// A single rating event: a user expressed (or withdrew) a preference for an item.
///
/// `value == None` is an unrate: any earlier rating of the same (user, item)
/// pair is withdrawn. Binary packs store it as NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rating {
    pub user: i64,
    pub item: i64,
    pub value: Option<f64>,
    pub timestamp: i64,
}

impl Rating {
    /// Rating without a timestamp
    pub fn new(user: i64, item: i64, value: f64) -> Self {
        Self {
            user,
            item,
            value: Some(value),
            timestamp: NO_TIMESTAMP,
        }
    }

    pub fn with_timestamp(user: i64, item: i64, value: f64, timestamp: i64) -> Self {
        Self {
            user,
            item,
            value: Some(value),
            timestamp,
        }
    }

    /// Unrate event for a (user, item) pair
    pub fn unrate(user: i64, item: i64, timestamp: i64) -> Self {
        Self {
            user,
            item,
            value: None,
            timestamp,
        }
    }

    #[inline]
    pub fn is_unrate(&self) -> bool {
        self.value.is_none()
    }

    /// The preference expressed by this event, if it is not an unrate.
    pub fn preference(&self) -> Option<Preference> {
        self.value.map(|value| Preference {
            user: self.user,
            item: self.item,
            value,
        })
    }

    /// Total order by timestamp only.
    pub fn cmp_timestamp(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self {
            user: 0,
            item: 0,
            value: None,
            timestamp: NO_TIMESTAMP,
        }
    }
}

/// A live (user, item, value) preference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preference {
    pub user: i64,
    pub item: i64,
    pub value: f64,
}

impl Preference {
    pub fn new(user: i64, item: i64, value: f64) -> Self {
        Self { user, item, value }
    }
}
