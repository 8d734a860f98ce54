//! Tether Graph - The persistent follow graph
//!
//! This crate owns the backing store: user records plus two adjacency
//! indexes, one for outgoing edges (following) and one for incoming
//! edges (followers). The two indexes are two views of one logical edge
//! and are only ever written together, inside a single transaction that
//! also moves the denormalized counters.
//!
//! # Architecture
//!
//! Three sled trees:
//! - `users`: user id -> [`UserRecord`]
//! - `following`: (follower, followed) -> [`FollowEdge`]
//! - `followers`: (followed, follower) -> [`FollowEdge`]
//!
//! Edge keys are length-prefixed composites, so a prefix scan on one
//! user id enumerates that user's adjacency set without ambiguity.
//!
//! # Example
//!
//! ```no_run
//! use tether_core::{UserId, UserRecord};
//! use tether_graph::FollowStore;
//!
//! let store = FollowStore::open("/tmp/tether-db").unwrap();
//! let a = UserId::parse("u1").unwrap();
//! let b = UserId::parse("u2").unwrap();
//! store.put_user(&a, &UserRecord::new(0)).unwrap();
//! store.put_user(&b, &UserRecord::new(0)).unwrap();
//!
//! let status = store.toggle(&a, &b).unwrap();
//! println!("{status}");
//! ```

mod follow;
mod keys;
mod store;

pub use store::{FollowStore, StoreError, UserPage};

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
