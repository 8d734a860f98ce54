//! The follow operations: toggle, stats, status, counter maintenance.
//!
//! Toggle is the only edge writer. The existence check and the branch
//! are the whole state machine: a pair is either `NotFollowing` or
//! `Following`, and toggle flips it. Because the check and both index
//! writes and both counter writes run in one serializable transaction,
//! concurrent toggles of the same pair are linearized by the store and
//! the final state reflects the parity of committed toggles.

use crate::keys::{decode_edge_suffix, edge_key, user_key};
use crate::store::{unix_millis, FollowStore, StoreError};
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Transactional, Tree};
use tether_core::{FollowEdge, FollowError, FollowStats, ToggleStatus, UserId, UserRecord};
use tracing::debug;

/// Reason a transaction bailed out deliberately.
#[derive(Debug)]
enum TxAbort {
    NotFound(UserId),
    Corrupt(String),
}

type TxResult<T> = Result<T, ConflictableTransactionError<TxAbort>>;

fn tx_get_user(tree: &TransactionalTree, id: &UserId, key: &[u8]) -> TxResult<UserRecord> {
    let bytes = tree
        .get(key)?
        .ok_or_else(|| ConflictableTransactionError::Abort(TxAbort::NotFound(id.clone())))?;
    bincode::deserialize(&bytes)
        .map_err(|e| ConflictableTransactionError::Abort(TxAbort::Corrupt(e.to_string())))
}

fn tx_encode<T: Serialize>(value: &T) -> TxResult<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| ConflictableTransactionError::Abort(TxAbort::Corrupt(e.to_string())))
}

fn finish<T>(result: Result<T, TransactionError<TxAbort>>) -> Result<T, FollowError> {
    match result {
        Ok(v) => Ok(v),
        Err(TransactionError::Abort(TxAbort::NotFound(id))) => {
            Err(FollowError::NotFound(format!("user {id} does not exist")))
        }
        Err(TransactionError::Abort(TxAbort::Corrupt(msg))) => {
            Err(StoreError::Corrupt(msg).into())
        }
        Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e).into()),
    }
}

impl FollowStore {
    /// Flips the follow state of the ordered pair (follower, followed).
    ///
    /// Runs as one transaction over all three trees: the edge is read,
    /// then either both index entries are deleted and both counters
    /// decremented, or both entries are created with a server-assigned
    /// timestamp and both counters incremented. sled retries the
    /// transaction internally on write-write conflicts, and retries are
    /// idempotent because edge identity is the pair itself.
    ///
    /// User existence is re-checked inside the transaction, so a
    /// concurrent account deletion cannot strand half an edge.
    pub fn toggle(&self, follower: &UserId, followed: &UserId) -> Result<ToggleStatus, FollowError> {
        if follower == followed {
            return Err(FollowError::InvalidArgument("cannot follow yourself".into()));
        }

        let follower_key = user_key(follower);
        let followed_key = user_key(followed);
        let fwd = edge_key(follower, followed);
        let rev = edge_key(followed, follower);
        let now_ms = unix_millis();

        // sled implements multi-tree transactions over slices; the order
        // here is (users, following, followers).
        let trees: &[&Tree] = &[&self.users, &self.following, &self.followers];
        let result = trees.transaction(
            |txn: &Vec<TransactionalTree>| {
                let (users, following, followers) = (&txn[0], &txn[1], &txn[2]);
                let mut src = tx_get_user(users, follower, &follower_key)?;
                let mut dst = tx_get_user(users, followed, &followed_key)?;

                let status = if following.get(fwd.as_slice())?.is_some() {
                    following.remove(fwd.as_slice())?;
                    followers.remove(rev.as_slice())?;
                    // Saturating: drift must never underflow a counter.
                    src.following_count = Some(src.following().saturating_sub(1));
                    dst.followers_count = Some(dst.followers().saturating_sub(1));
                    ToggleStatus::Unfollowed
                } else {
                    let edge = tx_encode(&FollowEdge {
                        created_at_ms: now_ms,
                    })?;
                    following.insert(fwd.as_slice(), edge.as_slice())?;
                    followers.insert(rev.as_slice(), edge.as_slice())?;
                    src.following_count = Some(src.following() + 1);
                    dst.followers_count = Some(dst.followers() + 1);
                    ToggleStatus::Followed
                };

                users.insert(follower_key.as_slice(), tx_encode(&src)?.as_slice())?;
                users.insert(followed_key.as_slice(), tx_encode(&dst)?.as_slice())?;
                Ok(status)
            },
        );

        let status = finish(result)?;
        self.db.flush().map_err(StoreError::Sled)?;
        debug!(%follower, %followed, %status, "toggled follow edge");
        Ok(status)
    }

    /// Reads the denormalized counters for one user.
    ///
    /// Non-transactional by design; may lag true cardinality by up to
    /// one reconciliation interval after a partial failure elsewhere.
    pub fn follow_stats(&self, user: &UserId) -> Result<FollowStats, FollowError> {
        let rec = self
            .get_user(user)
            .map_err(FollowError::from)?
            .ok_or_else(|| FollowError::NotFound(format!("user {user} does not exist")))?;
        Ok(FollowStats {
            followers_count: rec.followers(),
            following_count: rec.following(),
        })
    }

    /// Whether the edge (follower -> followed) currently exists.
    ///
    /// Probes the same index toggle writes, so it always reflects the
    /// latest committed edge state.
    pub fn is_following(&self, follower: &UserId, followed: &UserId) -> Result<bool, StoreError> {
        Ok(self.following.contains_key(edge_key(follower, followed))?)
    }

    /// Fetches the stored edge, if any.
    pub fn edge(&self, follower: &UserId, followed: &UserId) -> Result<Option<FollowEdge>, StoreError> {
        match self.following.get(edge_key(follower, followed))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Everyone `user` follows.
    pub fn list_following(&self, user: &UserId) -> Result<Vec<UserId>, StoreError> {
        adjacency(&self.following, user)
    }

    /// Everyone following `user`.
    pub fn list_followers(&self, user: &UserId) -> Result<Vec<UserId>, StoreError> {
        adjacency(&self.followers, user)
    }

    /// Cardinality of `user`'s following set, without materializing it.
    pub fn count_following(&self, user: &UserId) -> Result<u64, StoreError> {
        cardinality(&self.following, user)
    }

    /// Cardinality of `user`'s followers set, without materializing it.
    pub fn count_followers(&self, user: &UserId) -> Result<u64, StoreError> {
        cardinality(&self.followers, user)
    }

    /// Zero-initializes the counters of a freshly created record.
    ///
    /// Idempotent: returns `true` if this call initialized them, `false`
    /// if they already were. The lifecycle hook calls this once per
    /// account-created event; replays are no-ops.
    pub fn ensure_counters(&self, user: &UserId) -> Result<bool, FollowError> {
        let key = user_key(user);
        let result = self.users.transaction(|users| {
            let mut rec = tx_get_user(users, user, &key)?;
            if rec.counters_initialized() {
                return Ok(false);
            }
            rec.followers_count.get_or_insert(0);
            rec.following_count.get_or_insert(0);
            users.insert(key.as_slice(), tx_encode(&rec)?.as_slice())?;
            Ok(true)
        });
        let initialized = finish(result)?;
        if initialized {
            self.db.flush().map_err(StoreError::Sled)?;
        }
        Ok(initialized)
    }

    /// Overwrites both counters with recomputed values.
    ///
    /// The reconciler's repair write. Absolute, so concurrent passes are
    /// last-write-wins per user and both converge on the edge indexes.
    pub fn set_counters(
        &self,
        user: &UserId,
        followers: u64,
        following: u64,
    ) -> Result<(), FollowError> {
        let key = user_key(user);
        let result = self.users.transaction(|users| {
            let mut rec = tx_get_user(users, user, &key)?;
            rec.followers_count = Some(followers);
            rec.following_count = Some(following);
            users.insert(key.as_slice(), tx_encode(&rec)?.as_slice())?;
            Ok(())
        });
        finish(result)?;
        self.db.flush().map_err(StoreError::Sled)?;
        Ok(())
    }
}

fn adjacency(tree: &Tree, user: &UserId) -> Result<Vec<UserId>, StoreError> {
    let prefix = user_key(user);
    let mut ids = Vec::new();
    for entry in tree.scan_prefix(&prefix) {
        let (key, _) = entry?;
        ids.push(decode_edge_suffix(&key, prefix.len())?);
    }
    Ok(ids)
}

fn cardinality(tree: &Tree, user: &UserId) -> Result<u64, StoreError> {
    let prefix = user_key(user);
    let mut n = 0u64;
    for entry in tree.scan_prefix(&prefix) {
        entry?;
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn id(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn initialized_record() -> UserRecord {
        UserRecord {
            followers_count: Some(0),
            following_count: Some(0),
            created_at_ms: 0,
        }
    }

    fn seeded_store() -> (TempDir, FollowStore, UserId, UserId) {
        let dir = tempdir().unwrap();
        let store = FollowStore::open(dir.path()).unwrap();
        let u1 = id("u1");
        let u2 = id("u2");
        store.put_user(&u1, &initialized_record()).unwrap();
        store.put_user(&u2, &initialized_record()).unwrap();
        (dir, store, u1, u2)
    }

    #[test]
    fn test_self_follow_rejected_without_side_effects() {
        let (_dir, store, u1, _) = seeded_store();

        let err = store.toggle(&u1, &u1).unwrap_err();
        assert!(matches!(err, FollowError::InvalidArgument(_)));

        let stats = store.follow_stats(&u1).unwrap();
        assert_eq!(stats.followers_count, 0);
        assert_eq!(stats.following_count, 0);
        assert!(!store.is_following(&u1, &u1).unwrap());
    }

    #[test]
    fn test_toggle_missing_user_is_not_found() {
        let (_dir, store, u1, _) = seeded_store();
        let ghost = id("ghost");

        assert!(matches!(
            store.toggle(&u1, &ghost),
            Err(FollowError::NotFound(_))
        ));
        assert!(matches!(
            store.toggle(&ghost, &u1),
            Err(FollowError::NotFound(_))
        ));
        // The rejected toggles left nothing behind.
        assert_eq!(store.follow_stats(&u1).unwrap().following_count, 0);
    }

    #[test]
    fn test_follow_then_unfollow_scenario() {
        let (_dir, store, u1, u2) = seeded_store();

        assert_eq!(store.toggle(&u1, &u2).unwrap(), ToggleStatus::Followed);
        assert!(store.is_following(&u1, &u2).unwrap());
        assert!(!store.is_following(&u2, &u1).unwrap());

        let u2_stats = store.follow_stats(&u2).unwrap();
        assert_eq!(u2_stats.followers_count, 1);
        assert_eq!(u2_stats.following_count, 0);
        let u1_stats = store.follow_stats(&u1).unwrap();
        assert_eq!(u1_stats.followers_count, 0);
        assert_eq!(u1_stats.following_count, 1);

        assert_eq!(store.toggle(&u1, &u2).unwrap(), ToggleStatus::Unfollowed);
        assert!(!store.is_following(&u1, &u2).unwrap());
        let u2_stats = store.follow_stats(&u2).unwrap();
        assert_eq!(u2_stats.followers_count, 0);
        assert_eq!(u2_stats.following_count, 0);
    }

    #[test]
    fn test_toggle_is_an_involution() {
        let (_dir, store, u1, u2) = seeded_store();

        let before_u1 = store.follow_stats(&u1).unwrap();
        let before_u2 = store.follow_stats(&u2).unwrap();

        store.toggle(&u1, &u2).unwrap();
        store.toggle(&u1, &u2).unwrap();

        assert_eq!(store.follow_stats(&u1).unwrap(), before_u1);
        assert_eq!(store.follow_stats(&u2).unwrap(), before_u2);
        assert!(store.list_following(&u1).unwrap().is_empty());
        assert!(store.list_followers(&u2).unwrap().is_empty());
    }

    #[test]
    fn test_mirror_invariant_holds_after_every_commit() {
        let (_dir, store, u1, u2) = seeded_store();
        let u3 = id("u3");
        store.put_user(&u3, &initialized_record()).unwrap();

        store.toggle(&u1, &u2).unwrap();
        store.toggle(&u3, &u2).unwrap();
        store.toggle(&u1, &u3).unwrap();

        assert_eq!(store.list_following(&u1).unwrap(), vec![u2.clone(), u3.clone()]);
        assert_eq!(store.list_followers(&u2).unwrap(), vec![u1.clone(), u3.clone()]);
        assert_eq!(store.list_followers(&u3).unwrap(), vec![u1.clone()]);

        store.toggle(&u1, &u2).unwrap();
        assert_eq!(store.list_following(&u1).unwrap(), vec![u3.clone()]);
        assert_eq!(store.list_followers(&u2).unwrap(), vec![u3.clone()]);

        // Both views agree edge by edge.
        for follower in [&u1, &u3] {
            for followed in store.list_following(follower).unwrap() {
                assert!(store
                    .list_followers(&followed)
                    .unwrap()
                    .contains(follower));
            }
        }
    }

    #[test]
    fn test_retry_after_commit_flips_instead_of_double_applying() {
        let (_dir, store, u1, u2) = seeded_store();

        // First attempt commits, but the client times out and re-issues.
        assert_eq!(store.toggle(&u1, &u2).unwrap(), ToggleStatus::Followed);
        assert_eq!(store.toggle(&u1, &u2).unwrap(), ToggleStatus::Unfollowed);

        // Counters moved by one each way, never by two.
        let stats = store.follow_stats(&u2).unwrap();
        assert_eq!(stats.followers_count, 0);
        assert_eq!(store.count_followers(&u2).unwrap(), 0);
    }

    #[test]
    fn test_toggle_works_on_uninitialized_counters() {
        let dir = tempdir().unwrap();
        let store = FollowStore::open(dir.path()).unwrap();
        let u1 = id("u1");
        let u2 = id("u2");
        // Records created by the account subsystem before the lifecycle
        // hook has run: counters still unset.
        store.put_user(&u1, &UserRecord::new(0)).unwrap();
        store.put_user(&u2, &UserRecord::new(0)).unwrap();

        assert_eq!(store.toggle(&u1, &u2).unwrap(), ToggleStatus::Followed);
        let rec = store.get_user(&u2).unwrap().unwrap();
        assert_eq!(rec.followers_count, Some(1));
    }

    #[test]
    fn test_decrement_saturates_on_drifted_counter() {
        let (_dir, store, u1, u2) = seeded_store();

        store.toggle(&u1, &u2).unwrap();
        // Simulated drift: a crash elsewhere left the counter low.
        store.set_counters(&u2, 0, 0).unwrap();

        store.toggle(&u1, &u2).unwrap();
        assert_eq!(store.follow_stats(&u2).unwrap().followers_count, 0);
    }

    #[test]
    fn test_ensure_counters_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = FollowStore::open(dir.path()).unwrap();
        let u = id("u1");
        store.put_user(&u, &UserRecord::new(7)).unwrap();

        assert!(store.ensure_counters(&u).unwrap());
        assert!(!store.ensure_counters(&u).unwrap());

        let rec = store.get_user(&u).unwrap().unwrap();
        assert_eq!(rec.followers_count, Some(0));
        assert_eq!(rec.following_count, Some(0));
        assert_eq!(rec.created_at_ms, 7);

        assert!(matches!(
            store.ensure_counters(&id("ghost")),
            Err(FollowError::NotFound(_))
        ));
    }

    #[test]
    fn test_ensure_counters_preserves_live_values() {
        let (_dir, store, u1, u2) = seeded_store();
        store.toggle(&u1, &u2).unwrap();

        // A replayed account-created event must not reset real counts.
        assert!(!store.ensure_counters(&u2).unwrap());
        assert_eq!(store.follow_stats(&u2).unwrap().followers_count, 1);
    }

    #[test]
    fn test_set_counters_is_absolute() {
        let (_dir, store, _u1, u2) = seeded_store();
        store.set_counters(&u2, 5, 7).unwrap();
        let stats = store.follow_stats(&u2).unwrap();
        assert_eq!(stats.followers_count, 5);
        assert_eq!(stats.following_count, 7);
    }

    #[test]
    fn test_concurrent_pair_race_serializes() {
        let (_dir, store, u1, u2) = seeded_store();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = Arc::clone(&store);
            let (a, b) = (u1.clone(), u2.clone());
            handles.push(std::thread::spawn(move || store.toggle(&a, &b).unwrap()));
        }
        let mut statuses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        statuses.sort_by_key(|s| *s == ToggleStatus::Unfollowed);

        // Commit order decides who creates and who removes, but exactly
        // one of each happens.
        assert_eq!(statuses, vec![ToggleStatus::Followed, ToggleStatus::Unfollowed]);

        let stats = store.follow_stats(&u2).unwrap();
        assert_eq!(stats.followers_count, 0);
        assert!(!store.is_following(&u1, &u2).unwrap());
        assert!(store.list_followers(&u2).unwrap().is_empty());
        assert!(store.list_following(&u1).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_record_surfaces_internal_error() {
        let (_dir, store, u1, u2) = seeded_store();
        crate::testkit::corrupt_user_record(&store, &u2).unwrap();

        let err = store.toggle(&u1, &u2).unwrap_err();
        assert!(matches!(err, FollowError::Internal(_)));
    }
}
