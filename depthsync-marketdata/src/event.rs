//! Events published downstream by a sync engine.

use depthsync_core::{PairKey, Price, PriceLevelUpdate, Qty};

/// Best bid and offer at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TopOfBook {
    /// Highest bid, if any.
    pub best_bid: Option<(Price, Qty)>,
    /// Lowest ask, if any.
    pub best_ask: Option<(Price, Qty)>,
}

impl TopOfBook {
    /// Returns true if neither side has a level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.best_bid.is_none() && self.best_ask.is_none()
    }
}

/// One owned message on the per-pair downstream queue.
///
/// Per pair the order is always `Clear`, then a `Baseline`, then `Diff`s,
/// with a `TopOfBook` after each applied batch. A new `Clear` starts the cycle
/// over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookEvent {
    /// Drop every level previously received for this pair.
    Clear {
        /// Book identity.
        pair: PairKey,
    },
    /// Snapshot levels forming the new starting state.
    Baseline {
        /// Book identity.
        pair: PairKey,
        /// Snapshot id.
        last_update_id: u64,
        /// Snapshot levels, bids first.
        levels: Vec<PriceLevelUpdate>,
    },
    /// Level updates of one applied diff batch.
    Diff {
        /// Book identity.
        pair: PairKey,
        /// First id of the batch.
        first_id: u64,
        /// Last id of the batch.
        last_id: u64,
        /// Level updates, bids first.
        levels: Vec<PriceLevelUpdate>,
    },
    /// BBO after an applied batch.
    TopOfBook {
        /// Book identity.
        pair: PairKey,
        /// Best levels.
        top: TopOfBook,
    },
}

impl BookEvent {
    /// Pair this event belongs to.
    #[must_use]
    pub fn pair(&self) -> &PairKey {
        match self {
            Self::Clear { pair }
            | Self::Baseline { pair, .. }
            | Self::Diff { pair, .. }
            | Self::TopOfBook { pair, .. } => pair,
        }
    }

    /// Returns true for `Clear`, the one event that is deferred instead of dropped.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear { .. })
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Clear { .. } => "clear",
            Self::Baseline { .. } => "baseline",
            Self::Diff { .. } => "diff",
            Self::TopOfBook { .. } => "top_of_book",
        }
    }
}
