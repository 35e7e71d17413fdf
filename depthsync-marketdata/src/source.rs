//! Upstream diff feeds consumed by the engine.

use depthsync_channel::{MpscReceiver, SpscReceiver, TryRecvError};
use depthsync_core::DiffBatch;
use std::collections::VecDeque;

/// Result of polling a diff source once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedPoll {
    /// The next batch in delivery order.
    Batch(DiffBatch),
    /// Nothing queued right now.
    Idle,
    /// The producer is gone and the queue is drained.
    Closed,
}

/// Non-blocking producer of diff batches.
pub trait DiffSource {
    /// Returns the next batch without blocking.
    fn poll_batch(&mut self) -> FeedPoll;
}

impl DiffSource for SpscReceiver<DiffBatch> {
    #[inline]
    fn poll_batch(&mut self) -> FeedPoll {
        match self.try_recv() {
            Ok(batch) => FeedPoll::Batch(batch),
            Err(TryRecvError::Empty) => FeedPoll::Idle,
            Err(TryRecvError::Disconnected) => FeedPoll::Closed,
        }
    }
}

impl DiffSource for MpscReceiver<DiffBatch> {
    #[inline]
    fn poll_batch(&mut self) -> FeedPoll {
        match self.try_recv() {
            Ok(batch) => FeedPoll::Batch(batch),
            Err(TryRecvError::Empty) => FeedPoll::Idle,
            Err(TryRecvError::Disconnected) => FeedPoll::Closed,
        }
    }
}

/// Finite replay source; closes once empty.
impl DiffSource for VecDeque<DiffBatch> {
    fn poll_batch(&mut self) -> FeedPoll {
        self.pop_front().map_or(FeedPoll::Closed, FeedPoll::Batch)
    }
}
