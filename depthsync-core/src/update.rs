//! Level updates, diff batches and snapshots.

use crate::error::{CoreError, Result};
use crate::types::{Price, Qty, Side};
use serde::{Deserialize, Serialize};

/// Absolute mutation of one price level.
///
/// `qty == 0` deletes the level; any other quantity replaces the level's
/// aggregate quantity. Updates are never deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceLevelUpdate {
    /// Side of the book.
    pub side: Side,
    /// Fixed-point price.
    pub price: Price,
    /// Aggregate quantity at the price (0 = delete).
    pub qty: Qty,
}

impl PriceLevelUpdate {
    /// Creates an update.
    #[inline]
    #[must_use]
    pub const fn new(side: Side, price: Price, qty: Qty) -> Self {
        Self { side, price, qty }
    }

    /// Creates a bid-side update from raw scaled integers.
    #[inline]
    #[must_use]
    pub const fn bid(price: i64, qty: u64) -> Self {
        Self::new(Side::Bid, Price(price), Qty(qty))
    }

    /// Creates an ask-side update from raw scaled integers.
    #[inline]
    #[must_use]
    pub const fn ask(price: i64, qty: u64) -> Self {
        Self::new(Side::Ask, Price(price), Qty(qty))
    }

    /// Returns true if this update removes its level.
    #[inline]
    #[must_use]
    pub const fn is_delete(&self) -> bool {
        self.qty.is_zero()
    }
}

/// One incremental exchange message covering ids `first_id..=last_id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffBatch {
    /// First update id covered by this batch.
    pub first_id: u64,
    /// Last update id covered by this batch.
    pub last_id: u64,
    /// Bid-side updates in exchange order.
    pub bids: Vec<PriceLevelUpdate>,
    /// Ask-side updates in exchange order.
    pub asks: Vec<PriceLevelUpdate>,
}

impl DiffBatch {
    /// Creates a batch.
    #[must_use]
    pub fn new(
        first_id: u64,
        last_id: u64,
        bids: Vec<PriceLevelUpdate>,
        asks: Vec<PriceLevelUpdate>,
    ) -> Self {
        Self {
            first_id,
            last_id,
            bids,
            asks,
        }
    }

    /// Checks the id range and that every update sits on its container's side.
    ///
    /// # Errors
    /// Returns [`CoreError::InvertedRange`] or [`CoreError::SideMismatch`].
    pub fn validate(&self) -> Result<()> {
        if self.first_id > self.last_id {
            return Err(CoreError::InvertedRange {
                first_id: self.first_id,
                last_id: self.last_id,
            });
        }
        check_sides(Side::Bid, &self.bids)?;
        check_sides(Side::Ask, &self.asks)
    }

    /// Returns true if `id` falls inside this batch's range.
    #[inline]
    #[must_use]
    pub fn covers(&self, id: u64) -> bool {
        self.first_id <= id && id <= self.last_id
    }

    /// Iterates bids then asks.
    pub fn updates(&self) -> impl Iterator<Item = PriceLevelUpdate> + '_ {
        self.bids.iter().chain(self.asks.iter()).copied()
    }

    /// Consumes the batch into one ordered update list, bids first.
    #[must_use]
    pub fn into_updates(self) -> Vec<PriceLevelUpdate> {
        let mut levels = self.bids;
        levels.extend(self.asks);
        levels
    }

    /// Total number of level updates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Returns true if the batch carries no level updates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Full book state as of `last_update_id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Update id the snapshot reflects.
    pub last_update_id: u64,
    /// Bid levels.
    pub bids: Vec<PriceLevelUpdate>,
    /// Ask levels.
    pub asks: Vec<PriceLevelUpdate>,
}

impl Snapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(
        last_update_id: u64,
        bids: Vec<PriceLevelUpdate>,
        asks: Vec<PriceLevelUpdate>,
    ) -> Self {
        Self {
            last_update_id,
            bids,
            asks,
        }
    }

    /// Checks that every level sits on its container's side.
    ///
    /// # Errors
    /// Returns [`CoreError::SideMismatch`].
    pub fn validate(&self) -> Result<()> {
        check_sides(Side::Bid, &self.bids)?;
        check_sides(Side::Ask, &self.asks)
    }

    /// Iterates bids then asks.
    pub fn levels(&self) -> impl Iterator<Item = PriceLevelUpdate> + '_ {
        self.bids.iter().chain(self.asks.iter()).copied()
    }

    /// Consumes the snapshot into one ordered level list, bids first.
    #[must_use]
    pub fn into_levels(self) -> Vec<PriceLevelUpdate> {
        let mut levels = self.bids;
        levels.extend(self.asks);
        levels
    }
}

fn check_sides(expected: Side, updates: &[PriceLevelUpdate]) -> Result<()> {
    match updates.iter().find(|u| u.side != expected) {
        Some(u) => Err(CoreError::SideMismatch {
            expected,
            actual: u.side,
        }),
        None => Ok(()),
    }
}
