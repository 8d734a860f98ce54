//! Store lifecycle and user-record access.
//!
//! The follow operations themselves live in `follow.rs`; this module
//! opens the trees and provides the user-record seam shared with the
//! account subsystem.

use crate::keys::{decode_user_key, user_key};
use sled::{Db, Tree};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tether_core::{FollowError, UserId, UserRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for FollowError {
    fn from(err: StoreError) -> Self {
        FollowError::Internal(err.to_string())
    }
}

/// One page of a paginated user scan.
///
/// `next` is the resume cursor: pass it back to [`FollowStore::scan_users`]
/// to fetch the following page. `None` means the scan is complete.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub ids: Vec<UserId>,
    pub next: Option<UserId>,
}

/// The persistent follow graph.
///
/// Holds the user records and both adjacency indexes. Every multi-key
/// mutation goes through one serializable sled transaction, so no
/// caller ever observes an edge without its mirror or a counter moved
/// without its edge.
pub struct FollowStore {
    pub(crate) db: Db,
    pub(crate) users: Tree,
    pub(crate) following: Tree,
    pub(crate) followers: Tree,
}

impl FollowStore {
    /// Opens or creates a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let users = db.open_tree("users")?;
        let following = db.open_tree("following")?;
        let followers = db.open_tree("followers")?;
        Ok(Self {
            db,
            users,
            following,
            followers,
        })
    }

    /// Fetches a user record.
    pub fn get_user(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        match self.users.get(user_key(id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes a user record.
    ///
    /// This is the account-subsystem seam: Tether itself only mutates
    /// the two counters, and only through [`FollowStore::toggle`],
    /// [`FollowStore::ensure_counters`] and [`FollowStore::set_counters`].
    pub fn put_user(&self, id: &UserId, record: &UserRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record)?;
        self.users.insert(user_key(id), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Whether a user record exists.
    pub fn user_exists(&self, id: &UserId) -> Result<bool, StoreError> {
        Ok(self.users.contains_key(user_key(id))?)
    }

    /// Scans user ids in key order, one page at a time.
    ///
    /// `after` is exclusive. The full population never has to fit in
    /// memory; the reconciler pages through with a bounded `limit`.
    pub fn scan_users(&self, after: Option<&UserId>, limit: usize) -> Result<UserPage, StoreError> {
        use std::ops::Bound;

        let lower = match after {
            Some(cursor) => Bound::Excluded(user_key(cursor)),
            None => Bound::Unbounded,
        };

        let mut ids = Vec::with_capacity(limit);
        for entry in self.users.range((lower, Bound::<Vec<u8>>::Unbounded)) {
            let (key, _) = entry?;
            ids.push(decode_user_key(&key)?);
            if ids.len() == limit {
                break;
            }
        }

        let next = if ids.len() == limit {
            ids.last().cloned()
        } else {
            None
        };
        Ok(UserPage { ids, next })
    }
}

/// Server-assigned timestamp for new edges, unix milliseconds.
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn id(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[test]
    fn test_put_get_user() {
        let dir = tempdir().unwrap();
        let store = FollowStore::open(dir.path()).unwrap();

        let u = id("u1");
        assert!(store.get_user(&u).unwrap().is_none());
        assert!(!store.user_exists(&u).unwrap());

        let rec = UserRecord::new(42);
        store.put_user(&u, &rec).unwrap();
        assert_eq!(store.get_user(&u).unwrap(), Some(rec));
        assert!(store.user_exists(&u).unwrap());
    }

    #[test]
    fn test_scan_users_pages_through_everyone() {
        let dir = tempdir().unwrap();
        let store = FollowStore::open(dir.path()).unwrap();

        for i in 0..7 {
            store
                .put_user(&id(&format!("user-{i}")), &UserRecord::new(0))
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = store.scan_users(cursor.as_ref(), 3).unwrap();
            seen.extend(page.ids);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 7);
        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 7, "scan must not repeat users");
    }

    #[test]
    fn test_scan_users_empty_store() {
        let dir = tempdir().unwrap();
        let store = FollowStore::open(dir.path()).unwrap();
        let page = store.scan_users(None, 10).unwrap();
        assert!(page.ids.is_empty());
        assert!(page.next.is_none());
    }
}
