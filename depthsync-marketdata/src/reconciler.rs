//! Snapshot/diff reconciliation state machine.
//!
//! The reconciler decides what the engine may forward; it never touches the
//! book. One diff batch is handled in up to three steps:
//!
//! 1. [`SnapshotDiffReconciler::admit`] checks the batch against the last
//!    applied id. A synced, contiguous batch is admitted for direct apply.
//!    Anything else (no baseline yet, or a gap) requires a resync.
//! 2. On resync the caller clears its book, publishes `Clear`, and asks
//!    [`SnapshotDiffReconciler::begin_fetch`] whether a snapshot fetch may be
//!    issued now.
//! 3. The fetched snapshot (or fetch error) goes to
//!    [`SnapshotDiffReconciler::complete_fetch`], which runs the bridging test
//!    against the same batch that triggered the fetch.
//!
//! The snapshot is fetched synchronously between steps 2 and 3, so the batch
//! under test is always one that was received before the fetch was issued.

use crate::backoff::{ResyncBackoffConfig, ResyncThrottle};
use crate::error::SyncError;
use depthsync_core::{CoreError, DiffBatch, Snapshot};
use std::time::Instant;

/// Trustworthiness of the local view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No valid baseline. The next batch triggers a snapshot fetch.
    NeedSnapshot,
    /// Snapshot fetch in flight for the batch that triggered it.
    AwaitingBridge,
    /// Baseline bridged; contiguous batches apply directly.
    Synced,
}

/// Reconciliation state owned by one reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationState {
    /// Current phase.
    pub phase: Phase,
    /// Last id folded into the local view, if any.
    pub last_applied_id: Option<u64>,
}

impl Default for ReconciliationState {
    fn default() -> Self {
        Self {
            phase: Phase::NeedSnapshot,
            last_applied_id: None,
        }
    }
}

/// Why a resync is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncTrigger {
    /// No baseline yet, or the previous attempt did not bridge.
    NoBaseline,
    /// The batch does not start right after the last applied id.
    Gap {
        /// Id the batch had to start at.
        expected: u64,
        /// Id it started at.
        received: u64,
    },
}

impl ResyncTrigger {
    /// The [`SyncError::SequenceGap`] a gap stands for; `None` otherwise.
    #[must_use]
    pub fn gap_error(&self) -> Option<SyncError> {
        match *self {
            Self::Gap { expected, received } => Some(SyncError::SequenceGap { expected, received }),
            Self::NoBaseline => None,
        }
    }
}

/// Verdict on one incoming batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Synced and contiguous; apply the batch as-is.
    Apply,
    /// Clear the local view and fetch a snapshot.
    Resync(ResyncTrigger),
    /// The batch failed validation and must be dropped.
    Rejected(CoreError),
}

/// Result of the bridging test.
#[derive(Debug)]
pub enum BridgeOutcome {
    /// Snapshot and batch overlap: load the snapshot, then apply the batch.
    Bridged(Snapshot),
    /// The batch ends at or before the snapshot; discard it.
    StaleDiff {
        /// Last id of the discarded batch.
        diff_last_id: u64,
        /// Snapshot id.
        snapshot_id: u64,
    },
    /// The batch starts past the snapshot; the snapshot is already too old.
    StaleSnapshot {
        /// First id of the discarded batch.
        diff_first_id: u64,
        /// Snapshot id.
        snapshot_id: u64,
    },
    /// The fetch failed or returned an invalid snapshot.
    FetchFailed(SyncError),
}

/// Counters kept by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilerStats {
    /// Batches admitted for direct apply.
    pub applied: u64,
    /// Snapshots successfully bridged.
    pub bridged: u64,
    /// Resyncs started.
    pub resyncs: u64,
    /// Sequence gaps detected.
    pub gaps: u64,
    /// Batches discarded as older than the snapshot.
    pub stale_diffs: u64,
    /// Snapshots discarded as older than the batch.
    pub stale_snapshots: u64,
    /// Failed snapshot fetches.
    pub fetch_failures: u64,
    /// Malformed batches dropped.
    pub malformed: u64,
    /// Resyncs deferred by the backoff throttle.
    pub throttled: u64,
}

/// State machine turning a racy snapshot/diff pair into a gap-free stream.
#[derive(Debug)]
pub struct SnapshotDiffReconciler {
    state: ReconciliationState,
    throttle: ResyncThrottle,
    stats: ReconcilerStats,
}

impl SnapshotDiffReconciler {
    /// Creates a reconciler in [`Phase::NeedSnapshot`].
    #[must_use]
    pub fn new(backoff: &ResyncBackoffConfig) -> Self {
        Self {
            state: ReconciliationState::default(),
            throttle: ResyncThrottle::new(backoff),
            stats: ReconcilerStats::default(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ReconciliationState {
        self.state
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Last id folded into the local view.
    #[must_use]
    pub fn last_applied_id(&self) -> Option<u64> {
        self.state.last_applied_id
    }

    /// Returns true if the local view can be trusted.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.state.phase == Phase::Synced
    }

    /// Counters since creation.
    #[must_use]
    pub fn stats(&self) -> ReconcilerStats {
        self.stats
    }

    /// Classifies one batch.
    ///
    /// On [`Admission::Apply`] the batch is already recorded as applied. On
    /// [`Admission::Resync`] the state has dropped back to
    /// [`Phase::NeedSnapshot`] with no applied id.
    pub fn admit(&mut self, batch: &DiffBatch) -> Admission {
        if let Err(err) = batch.validate() {
            self.stats.malformed += 1;
            tracing::error!(
                first_id = batch.first_id,
                last_id = batch.last_id,
                error = %err,
                "malformed batch reached the reconciler"
            );
            return Admission::Rejected(err);
        }

        let gap = self
            .state
            .last_applied_id
            .map(|last| last.wrapping_add(1))
            .filter(|expected| *expected != batch.first_id);

        if let Some(expected) = gap {
            self.stats.gaps += 1;
            let trigger = ResyncTrigger::Gap {
                expected,
                received: batch.first_id,
            };
            if let Some(err) = trigger.gap_error() {
                tracing::warn!(error = %err, "resynchronizing");
            }
            return self.start_resync(trigger);
        }

        match self.state.phase {
            Phase::Synced => {
                self.state.last_applied_id = Some(batch.last_id);
                self.stats.applied += 1;
                Admission::Apply
            }
            Phase::NeedSnapshot | Phase::AwaitingBridge => {
                self.start_resync(ResyncTrigger::NoBaseline)
            }
        }
    }

    /// Asks whether the snapshot fetch may be issued at `now`.
    ///
    /// Returns true and moves to [`Phase::AwaitingBridge`] if allowed. Returns
    /// false while the resync backoff is holding fetches back; the caller then
    /// drops the batch and stays in [`Phase::NeedSnapshot`].
    pub fn begin_fetch(&mut self, now: Instant) -> bool {
        if !self.throttle.permits(now) {
            self.stats.throttled += 1;
            tracing::debug!(
                failures = self.throttle.consecutive_failures(),
                "snapshot fetch deferred by backoff"
            );
            return false;
        }
        self.state.phase = Phase::AwaitingBridge;
        true
    }

    /// Runs the bridging test between `batch` and the fetch result.
    pub fn complete_fetch(
        &mut self,
        batch: &DiffBatch,
        fetched: Result<Snapshot, SyncError>,
        now: Instant,
    ) -> BridgeOutcome {
        let snapshot = match fetched.and_then(|s| s.validate().map(|()| s).map_err(SyncError::from)) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.stats.fetch_failures += 1;
                self.fail_bridge(now);
                return BridgeOutcome::FetchFailed(err);
            }
        };

        let snapshot_id = snapshot.last_update_id;

        if batch.last_id <= snapshot_id {
            self.stats.stale_diffs += 1;
            self.fail_bridge(now);
            tracing::debug!(
                diff_last_id = batch.last_id,
                snapshot_id,
                "diff predates snapshot, discarded"
            );
            return BridgeOutcome::StaleDiff {
                diff_last_id: batch.last_id,
                snapshot_id,
            };
        }

        // batch.last_id > snapshot_id here, so snapshot_id + 1 cannot overflow.
        if batch.covers(snapshot_id + 1) {
            self.state = ReconciliationState {
                phase: Phase::Synced,
                last_applied_id: Some(batch.last_id),
            };
            self.stats.bridged += 1;
            self.throttle.on_success();
            tracing::info!(
                snapshot_id,
                first_id = batch.first_id,
                last_id = batch.last_id,
                "snapshot bridged, book synced"
            );
            return BridgeOutcome::Bridged(snapshot);
        }

        self.stats.stale_snapshots += 1;
        self.fail_bridge(now);
        tracing::debug!(
            diff_first_id = batch.first_id,
            snapshot_id,
            "snapshot older than diff, discarded"
        );
        BridgeOutcome::StaleSnapshot {
            diff_first_id: batch.first_id,
            snapshot_id,
        }
    }

    /// Forces a resync on the next batch.
    ///
    /// Used when the local view can no longer be vouched for downstream, for
    /// example after a batch could not be published.
    pub fn invalidate(&mut self) {
        self.state = ReconciliationState::default();
    }

    /// Counts a batch dropped before it reached [`Self::admit`].
    pub fn record_malformed(&mut self) {
        self.stats.malformed += 1;
    }

    fn start_resync(&mut self, trigger: ResyncTrigger) -> Admission {
        self.state = ReconciliationState::default();
        self.stats.resyncs += 1;
        Admission::Resync(trigger)
    }

    fn fail_bridge(&mut self, now: Instant) {
        self.state = ReconciliationState::default();
        self.throttle.on_failure(now);
    }
}

impl Default for SnapshotDiffReconciler {
    fn default() -> Self {
        Self::new(&ResyncBackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthsync_core::PriceLevelUpdate;
    use std::time::Duration;

    fn batch(first_id: u64, last_id: u64) -> DiffBatch {
        DiffBatch::new(first_id, last_id, vec![PriceLevelUpdate::bid(100, 1)], vec![])
    }

    fn snapshot(last_update_id: u64) -> Snapshot {
        Snapshot::new(
            last_update_id,
            vec![PriceLevelUpdate::bid(99, 5)],
            vec![PriceLevelUpdate::ask(101, 5)],
        )
    }

    /// Drives one batch through admit/begin/complete with a fixed snapshot.
    fn resync_with(
        rec: &mut SnapshotDiffReconciler,
        d: &DiffBatch,
        fetched: Result<Snapshot, SyncError>,
    ) -> BridgeOutcome {
        assert!(matches!(rec.admit(d), Admission::Resync(_)));
        let now = Instant::now();
        assert!(rec.begin_fetch(now));
        assert_eq!(rec.phase(), Phase::AwaitingBridge);
        rec.complete_fetch(d, fetched, now)
    }

    #[test]
    fn test_initial_state() {
        let rec = SnapshotDiffReconciler::default();
        assert_eq!(rec.phase(), Phase::NeedSnapshot);
        assert_eq!(rec.last_applied_id(), None);
        assert!(!rec.is_synced());
    }

    #[test]
    fn test_first_batch_requires_snapshot() {
        let mut rec = SnapshotDiffReconciler::default();
        assert_eq!(
            rec.admit(&batch(1, 5)),
            Admission::Resync(ResyncTrigger::NoBaseline)
        );
        assert_eq!(rec.stats().resyncs, 1);
    }

    #[test]
    fn test_bridge_snapshot_inside_batch() {
        let mut rec = SnapshotDiffReconciler::default();
        let d = batch(95, 110);

        let outcome = resync_with(&mut rec, &d, Ok(snapshot(100)));
        assert!(matches!(outcome, BridgeOutcome::Bridged(ref s) if s.last_update_id == 100));
        assert_eq!(rec.phase(), Phase::Synced);
        assert_eq!(rec.last_applied_id(), Some(110));
        assert_eq!(rec.stats().bridged, 1);
    }

    #[test]
    fn test_bridge_edges() {
        // Snapshot id + 1 equal to first_id.
        let mut rec = SnapshotDiffReconciler::default();
        let outcome = resync_with(&mut rec, &batch(101, 105), Ok(snapshot(100)));
        assert!(matches!(outcome, BridgeOutcome::Bridged(_)));

        // Snapshot id + 1 equal to last_id.
        let mut rec = SnapshotDiffReconciler::default();
        let outcome = resync_with(&mut rec, &batch(90, 101), Ok(snapshot(100)));
        assert!(matches!(outcome, BridgeOutcome::Bridged(_)));
        assert_eq!(rec.last_applied_id(), Some(101));
    }

    #[test]
    fn test_stale_diff_discarded() {
        let mut rec = SnapshotDiffReconciler::default();
        let outcome = resync_with(&mut rec, &batch(50, 80), Ok(snapshot(100)));

        assert!(matches!(
            outcome,
            BridgeOutcome::StaleDiff {
                diff_last_id: 80,
                snapshot_id: 100
            }
        ));
        assert_eq!(rec.phase(), Phase::NeedSnapshot);
        assert_eq!(rec.last_applied_id(), None);
        assert_eq!(rec.stats().stale_diffs, 1);
    }

    #[test]
    fn test_diff_ending_at_snapshot_is_stale() {
        let mut rec = SnapshotDiffReconciler::default();
        let outcome = resync_with(&mut rec, &batch(90, 100), Ok(snapshot(100)));
        assert!(matches!(outcome, BridgeOutcome::StaleDiff { .. }));
    }

    #[test]
    fn test_stale_snapshot_discarded() {
        let mut rec = SnapshotDiffReconciler::default();
        let outcome = resync_with(&mut rec, &batch(105, 110), Ok(snapshot(100)));

        assert!(matches!(
            outcome,
            BridgeOutcome::StaleSnapshot {
                diff_first_id: 105,
                snapshot_id: 100
            }
        ));
        assert_eq!(rec.phase(), Phase::NeedSnapshot);
        assert_eq!(rec.stats().stale_snapshots, 1);
    }

    #[test]
    fn test_fetch_failure_keeps_need_snapshot() {
        let mut rec = SnapshotDiffReconciler::default();
        let outcome = resync_with(
            &mut rec,
            &batch(10, 15),
            Err(SyncError::transport("timeout")),
        );

        assert!(matches!(outcome, BridgeOutcome::FetchFailed(_)));
        assert_eq!(rec.state(), ReconciliationState::default());
        assert_eq!(rec.stats().fetch_failures, 1);

        // Retried lazily on the next batch.
        let outcome = resync_with(&mut rec, &batch(16, 20), Ok(snapshot(17)));
        assert!(matches!(outcome, BridgeOutcome::Bridged(_)));
    }

    #[test]
    fn test_invalid_snapshot_counts_as_fetch_failure() {
        let mut rec = SnapshotDiffReconciler::default();
        let bad = Snapshot::new(12, vec![PriceLevelUpdate::ask(1, 1)], vec![]);
        let outcome = resync_with(&mut rec, &batch(10, 15), Ok(bad));

        assert!(matches!(
            outcome,
            BridgeOutcome::FetchFailed(SyncError::MalformedInput(_))
        ));
        assert_eq!(rec.phase(), Phase::NeedSnapshot);
    }

    #[test]
    fn test_synced_contiguous_applies() {
        let mut rec = SnapshotDiffReconciler::default();
        resync_with(&mut rec, &batch(10, 15), Ok(snapshot(12)));

        assert_eq!(rec.admit(&batch(16, 16)), Admission::Apply);
        assert_eq!(rec.admit(&batch(17, 30)), Admission::Apply);
        assert_eq!(rec.last_applied_id(), Some(30));
        assert_eq!(rec.stats().applied, 2);
    }

    #[test]
    fn test_gap_forces_resync() {
        let mut rec = SnapshotDiffReconciler::default();
        resync_with(&mut rec, &batch(40, 50), Ok(snapshot(45)));
        assert_eq!(rec.last_applied_id(), Some(50));

        let admission = rec.admit(&batch(52, 60));
        assert_eq!(
            admission,
            Admission::Resync(ResyncTrigger::Gap {
                expected: 51,
                received: 52
            })
        );
        assert_eq!(rec.phase(), Phase::NeedSnapshot);
        assert_eq!(rec.last_applied_id(), None);
        assert_eq!(rec.stats().gaps, 1);

        let Admission::Resync(trigger) = admission else {
            unreachable!()
        };
        assert_eq!(
            trigger.gap_error().unwrap().to_string(),
            "sequence gap: expected first id 51, received 52"
        );
        assert!(ResyncTrigger::NoBaseline.gap_error().is_none());
    }

    #[test]
    fn test_replayed_batch_is_a_gap() {
        let mut rec = SnapshotDiffReconciler::default();
        resync_with(&mut rec, &batch(40, 50), Ok(snapshot(45)));

        assert!(matches!(
            rec.admit(&batch(45, 50)),
            Admission::Resync(ResyncTrigger::Gap {
                expected: 51,
                received: 45
            })
        ));
    }

    #[test]
    fn test_malformed_batch_rejected_without_state_change() {
        let mut rec = SnapshotDiffReconciler::default();
        resync_with(&mut rec, &batch(10, 15), Ok(snapshot(12)));
        let before = rec.state();

        let admission = rec.admit(&batch(20, 18));
        assert!(matches!(
            admission,
            Admission::Rejected(CoreError::InvertedRange { .. })
        ));
        assert_eq!(rec.state(), before);
        assert_eq!(rec.stats().malformed, 1);
    }

    #[test]
    fn test_invalidate() {
        let mut rec = SnapshotDiffReconciler::default();
        resync_with(&mut rec, &batch(10, 15), Ok(snapshot(12)));

        rec.invalidate();
        assert_eq!(rec.phase(), Phase::NeedSnapshot);
        assert!(matches!(
            rec.admit(&batch(16, 17)),
            Admission::Resync(ResyncTrigger::NoBaseline)
        ));
    }

    #[test]
    fn test_throttle_defers_fetch() {
        let config = ResyncBackoffConfig {
            enabled: true,
            initial_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        };
        let mut rec = SnapshotDiffReconciler::new(&config);
        let now = Instant::now();

        rec.admit(&batch(105, 110));
        assert!(rec.begin_fetch(now));
        rec.complete_fetch(&batch(105, 110), Ok(snapshot(100)), now);

        rec.admit(&batch(111, 112));
        assert!(!rec.begin_fetch(now + Duration::from_secs(1)));
        assert_eq!(rec.phase(), Phase::NeedSnapshot);
        assert_eq!(rec.stats().throttled, 1);

        assert!(rec.begin_fetch(now + Duration::from_secs(61)));
    }

    #[test]
    fn test_scenario_bridge_then_direct_apply() {
        let mut rec = SnapshotDiffReconciler::default();

        let outcome = resync_with(&mut rec, &batch(10, 15), Ok(snapshot(12)));
        assert!(matches!(outcome, BridgeOutcome::Bridged(_)));
        assert_eq!(rec.phase(), Phase::Synced);
        assert_eq!(rec.last_applied_id(), Some(15));

        let next = DiffBatch::new(16, 16, vec![PriceLevelUpdate::bid(100, 0)], vec![]);
        assert_eq!(rec.admit(&next), Admission::Apply);
        assert_eq!(rec.last_applied_id(), Some(16));
    }
}
