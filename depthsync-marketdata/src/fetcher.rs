//! Snapshot fetch seam.

use crate::error::Result;
use depthsync_core::{PairKey, Snapshot};

/// Fetches a full-state snapshot of one book.
///
/// The call is synchronous and runs on the engine thread. While it is in
/// flight the engine processes nothing; diffs keep queueing upstream. This is
/// the engine's deliberate backpressure point, so implementations should
/// carry their own request timeout.
pub trait SnapshotFetcher {
    /// Fetches up to `depth` levels per side for `pair`.
    ///
    /// # Errors
    /// Any transport or decode failure. The engine stays unsynced and retries
    /// on the next diff.
    fn fetch(&mut self, pair: &PairKey, depth: u32) -> Result<Snapshot>;
}

impl<F> SnapshotFetcher for F
where
    F: FnMut(&PairKey, u32) -> Result<Snapshot>,
{
    fn fetch(&mut self, pair: &PairKey, depth: u32) -> Result<Snapshot> {
        self(pair, depth)
    }
}
