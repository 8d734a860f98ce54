//! Tether Reconciler - Scheduled counter repair
//!
//! The denormalized counters are kept exact by the toggle transaction,
//! but a crash between a commit and an external observer, or operator
//! edits, can leave them drifted. This crate walks the whole user
//! population on a schedule, recomputes each user's counters from the
//! adjacency indexes (the source of truth), and overwrites any counter
//! that disagrees.
//!
//! The job never touches edges, so it cannot race destructively with
//! live toggles; a toggle committing mid-pass can make one repair
//! immediately stale, and the next pass converges. Writes are absolute,
//! so overlapping passes (not prevented here) are last-write-wins per
//! user and both converge. The scan is paginated so the population
//! never has to fit in memory, but it remains a single-node sequential
//! pass; sharding it is out of scope.
//!
//! Failures are never surfaced to end users: a per-user failure is
//! counted and logged, a pass-level failure is logged and retried on
//! the next tick.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tether_core::UserId;
use tether_graph::{FollowStore, StoreError};
use tracing::{error, info, warn};

/// Schedule and batching knobs.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Time between passes.
    pub interval: Duration,
    /// Users fetched per scan page.
    pub page_size: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            page_size: 256,
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReconcileReport {
    pub users_scanned: u64,
    pub users_corrected: u64,
    pub users_failed: u64,
    pub duration_ms: u64,
}

/// The reconciliation job.
pub struct Reconciler {
    store: Arc<FollowStore>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(store: Arc<FollowStore>, config: ReconcilerConfig) -> Self {
        Self { store, config }
    }

    /// Runs passes forever: one immediately, then one per interval.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            ticker.tick().await;
            match self.run_once() {
                Ok(report) => info!(
                    scanned = report.users_scanned,
                    corrected = report.users_corrected,
                    failed = report.users_failed,
                    duration_ms = report.duration_ms,
                    "reconciliation pass complete"
                ),
                Err(e) => error!("reconciliation pass failed, will retry next tick: {e}"),
            }
        }
    }

    /// One full-population audit.
    ///
    /// Errors only if the user scan itself cannot make progress;
    /// per-user failures are counted in the report and skipped.
    pub fn run_once(&self) -> Result<ReconcileReport, StoreError> {
        let start = Instant::now();
        let mut report = ReconcileReport::default();
        let mut cursor: Option<UserId> = None;

        loop {
            let page = self.store.scan_users(cursor.as_ref(), self.config.page_size)?;
            for user in &page.ids {
                report.users_scanned += 1;
                match self.repair_user(user) {
                    Ok(true) => report.users_corrected += 1,
                    Ok(false) => {}
                    Err(e) => {
                        report.users_failed += 1;
                        warn!(%user, "skipping user, reconciliation failed: {e}");
                    }
                }
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Recomputes one user's counters and repairs them on drift.
    fn repair_user(&self, user: &UserId) -> Result<bool, tether_core::FollowError> {
        let stored = self.store.follow_stats(user)?;
        let followers = self.store.count_followers(user)?;
        let following = self.store.count_following(user)?;

        if stored.followers_count == followers && stored.following_count == following {
            return Ok(false);
        }

        warn!(
            %user,
            followers_before = stored.followers_count,
            followers_after = followers,
            following_before = stored.following_count,
            following_after = following,
            "counter drift detected, repairing"
        );
        self.store.set_counters(user, followers, following)?;
        Ok(true)
    }
}
