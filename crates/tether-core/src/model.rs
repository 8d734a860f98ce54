//! Stored records and operation results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A user record as the follow core sees it.
///
/// The record is owned by the account subsystem; this core reads and
/// mutates only the two counters. The counters are explicit optionals:
/// a freshly created account has not been initialized yet, and the
/// lifecycle hook sets both to zero exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// How many users follow this user. `None` until initialized.
    pub followers_count: Option<u64>,

    /// How many users this user follows. `None` until initialized.
    pub following_count: Option<u64>,

    /// Unix milliseconds at account creation.
    pub created_at_ms: i64,
}

impl UserRecord {
    /// A record as the account subsystem creates it: counters unset.
    pub fn new(created_at_ms: i64) -> Self {
        Self {
            followers_count: None,
            following_count: None,
            created_at_ms,
        }
    }

    /// Whether the lifecycle hook has run for this record.
    pub fn counters_initialized(&self) -> bool {
        self.followers_count.is_some() && self.following_count.is_some()
    }

    /// Follower count, reading an uninitialized counter as zero.
    pub fn followers(&self) -> u64 {
        self.followers_count.unwrap_or(0)
    }

    /// Following count, reading an uninitialized counter as zero.
    pub fn following(&self) -> u64 {
        self.following_count.unwrap_or(0)
    }
}

/// A directed follow edge, "A follows B".
///
/// Identity is the ordered pair of user ids, carried in the store key,
/// never in the value. There is no surrogate key: a retried create or
/// delete lands on the same identity and cannot double-apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    /// Server-assigned creation time, unix milliseconds.
    pub created_at_ms: i64,
}

/// Denormalized counters returned by stats queries.
///
/// May lag true edge cardinality by up to one reconciliation interval
/// after a partial failure; that staleness bound is documented behavior,
/// not a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowStats {
    pub followers_count: u64,
    pub following_count: u64,
}

/// Outcome of a follow toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleStatus {
    /// The edge did not exist and was created.
    Followed,
    /// The edge existed and was removed.
    Unfollowed,
}

impl fmt::Display for ToggleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Followed => "followed",
            Self::Unfollowed => "unfollowed",
        };
        f.write_str(s)
    }
}
