//! Price-level order book.
//!
//! Each side is a sorted map of price to aggregate quantity. The best level of
//! each side is cached so BBO reads never walk the tree; the cache is repaired
//! only when the best level itself is deleted.

use depthsync_core::{Price, PriceLevelUpdate, Qty, Side};
use std::collections::BTreeMap;

/// One side of the book.
#[derive(Debug, Clone)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<Price, Qty>,
    top: Option<(Price, Qty)>,
}

impl BookSide {
    /// Creates an empty side.
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            top: None,
        }
    }

    /// Which side this is.
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Sets or deletes the level at `price`. Deleting an absent level is a no-op.
    #[inline]
    pub fn apply(&mut self, price: Price, qty: Qty) {
        if qty.is_zero() {
            let removed = self.levels.remove(&price).is_some();
            if removed && self.top.is_some_and(|(p, _)| p == price) {
                self.top = self.scan_top();
            }
            return;
        }

        self.levels.insert(price, qty);
        match self.top {
            Some((p, _)) if p != price && !self.outranks(price, p) => {}
            _ => self.top = Some((price, qty)),
        }
    }

    /// Best level, highest bid or lowest ask.
    #[inline]
    #[must_use]
    pub fn top(&self) -> Option<(Price, Qty)> {
        self.top
    }

    /// Quantity resting at `price`.
    #[must_use]
    pub fn get(&self, price: Price) -> Option<Qty> {
        self.levels.get(&price).copied()
    }

    /// The `n` best levels in priority order.
    #[must_use]
    pub fn best_n(&self, n: usize) -> Vec<(Price, Qty)> {
        self.iter().take(n).collect()
    }

    /// Iterates every level in priority order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Price, Qty)> + '_> {
        let levels = self.levels.iter().map(|(p, q)| (*p, *q));
        match self.side {
            Side::Bid => Box::new(levels.rev()),
            Side::Ask => Box::new(levels),
        }
    }

    /// Removes every level.
    pub fn clear(&mut self) {
        self.levels.clear();
        self.top = None;
    }

    /// Number of price levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if there are no levels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    fn outranks(&self, a: Price, b: Price) -> bool {
        match self.side {
            Side::Bid => a > b,
            Side::Ask => a < b,
        }
    }

    fn scan_top(&self) -> Option<(Price, Qty)> {
        let best = match self.side {
            Side::Bid => self.levels.iter().next_back(),
            Side::Ask => self.levels.iter().next(),
        };
        best.map(|(p, q)| (*p, *q))
    }
}

/// Local view of one (exchange, pair) book.
///
/// A plain data structure: it applies whatever it is given, in order, and
/// knows nothing about sequencing. Crossed input is stored as-is.
#[derive(Debug, Clone)]
pub struct PriceLevelBook {
    bids: BookSide,
    asks: BookSide,
}

impl PriceLevelBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
        }
    }

    /// Applies one level update.
    #[inline]
    pub fn apply(&mut self, update: PriceLevelUpdate) {
        self.side_mut(update.side).apply(update.price, update.qty);
    }

    /// Applies updates in iteration order; the last write to a price wins.
    pub fn apply_batch<I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = PriceLevelUpdate>,
    {
        for update in updates {
            self.apply(update);
        }
    }

    /// Removes every level on both sides.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Highest bid.
    #[inline]
    #[must_use]
    pub fn best_bid(&self) -> Option<(Price, Qty)> {
        self.bids.top()
    }

    /// Lowest ask.
    #[inline]
    #[must_use]
    pub fn best_ask(&self) -> Option<(Price, Qty)> {
        self.asks.top()
    }

    /// Ask minus bid, in price units. Negative when crossed.
    #[inline]
    #[must_use]
    pub fn spread(&self) -> Option<i64> {
        let (bid, _) = self.best_bid()?;
        let (ask, _) = self.best_ask()?;
        ask.raw().checked_sub(bid.raw())
    }

    /// Midpoint of the BBO, rounded toward zero.
    #[inline]
    #[must_use]
    pub fn mid_price(&self) -> Option<i64> {
        let (bid, _) = self.best_bid()?;
        let (ask, _) = self.best_ask()?;
        let mid = (i128::from(bid.raw()) + i128::from(ask.raw())) / 2;
        i64::try_from(mid).ok()
    }

    /// Returns true when both sides are present and bid >= ask.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some((b, _)), Some((a, _))) if b >= a)
    }

    /// The `n` best levels of one side.
    #[must_use]
    pub fn depth(&self, side: Side, n: usize) -> Vec<(Price, Qty)> {
        self.side(side).best_n(n)
    }

    /// Quantity at one price.
    #[must_use]
    pub fn level(&self, side: Side, price: Price) -> Option<Qty> {
        self.side(side).get(price)
    }

    /// One side of the book.
    #[must_use]
    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Bid side.
    #[must_use]
    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    /// Ask side.
    #[must_use]
    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    /// Returns true if both sides are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}

impl Default for PriceLevelBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(price: i64, qty: u64) -> PriceLevelUpdate {
        PriceLevelUpdate::bid(price, qty)
    }

    fn ask(price: i64, qty: u64) -> PriceLevelUpdate {
        PriceLevelUpdate::ask(price, qty)
    }

    #[test]
    fn test_book_side_update() {
        let mut side = BookSide::new(Side::Bid);

        side.apply(Price(100), Qty(50));
        assert_eq!(side.len(), 1);
        assert_eq!(side.top(), Some((Price(100), Qty(50))));

        side.apply(Price(101), Qty(30));
        assert_eq!(side.len(), 2);
        assert_eq!(side.top(), Some((Price(101), Qty(30)))); // Best bid is highest

        side.apply(Price(101), Qty::ZERO);
        assert_eq!(side.len(), 1);
        assert_eq!(side.top(), Some((Price(100), Qty(50))));
    }

    #[test]
    fn test_remove_absent_level_is_noop() {
        let mut book = PriceLevelBook::new();
        book.apply(bid(100, 5));

        book.apply(bid(99, 0));
        book.apply(ask(200, 0));

        assert_eq!(book.bids().len(), 1);
        assert!(book.asks().is_empty());
        assert_eq!(book.best_bid(), Some((Price(100), Qty(5))));
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn test_last_write_wins_within_batch() {
        let mut book = PriceLevelBook::new();
        book.apply_batch([bid(100, 5), bid(100, 9), ask(105, 1), ask(105, 0), ask(105, 4)]);

        assert_eq!(book.level(Side::Bid, Price(100)), Some(Qty(9)));
        assert_eq!(book.level(Side::Ask, Price(105)), Some(Qty(4)));

        book.apply_batch([bid(100, 3), bid(100, 0)]);
        assert_eq!(book.level(Side::Bid, Price(100)), None);
        assert!(book.best_bid().is_none());
    }

    #[test]
    fn test_overwrite_top_quantity() {
        let mut side = BookSide::new(Side::Ask);
        side.apply(Price(100), Qty(10));
        side.apply(Price(101), Qty(20));

        side.apply(Price(100), Qty(75));
        assert_eq!(side.len(), 2);
        assert_eq!(side.top(), Some((Price(100), Qty(75))));

        // Worse level must not displace the cached top.
        side.apply(Price(102), Qty(1));
        assert_eq!(side.top(), Some((Price(100), Qty(75))));
    }

    #[test]
    fn test_top_cache_after_deleting_best() {
        let mut side = BookSide::new(Side::Ask);
        for (p, q) in [(103, 4), (100, 1), (102, 3), (101, 2)] {
            side.apply(Price(p), Qty(q));
        }
        assert_eq!(side.top(), Some((Price(100), Qty(1))));

        side.apply(Price(100), Qty::ZERO);
        assert_eq!(side.top(), Some((Price(101), Qty(2))));
        side.apply(Price(102), Qty::ZERO);
        assert_eq!(side.top(), Some((Price(101), Qty(2))));
        side.apply(Price(101), Qty::ZERO);
        side.apply(Price(103), Qty::ZERO);
        assert_eq!(side.top(), None);
    }

    #[test]
    fn test_bbo_ordering() {
        let mut book = PriceLevelBook::new();
        book.apply_batch([bid(98, 1), bid(99, 2), bid(97, 3), ask(101, 4), ask(103, 5), ask(102, 6)]);

        let (b, _) = book.best_bid().unwrap();
        let (a, _) = book.best_ask().unwrap();
        assert!(b < a);
        assert_eq!(b, Price(99));
        assert_eq!(a, Price(101));
        assert_eq!(book.spread(), Some(2));
        assert_eq!(book.mid_price(), Some(100));
        assert!(!book.is_crossed());
    }

    #[test]
    fn test_crossed_input_is_stored() {
        let mut book = PriceLevelBook::new();
        book.apply_batch([bid(105, 1), ask(100, 1)]);

        assert_eq!(book.best_bid(), Some((Price(105), Qty(1))));
        assert_eq!(book.best_ask(), Some((Price(100), Qty(1))));
        assert!(book.is_crossed());
        assert_eq!(book.spread(), Some(-5));
    }

    #[test]
    fn test_depth_priority_order() {
        let mut book = PriceLevelBook::new();
        book.apply_batch([ask(100, 10), ask(101, 20), ask(102, 30), ask(103, 40)]);
        book.apply_batch([bid(90, 1), bid(92, 2), bid(91, 3)]);

        let asks = book.depth(Side::Ask, 2);
        assert_eq!(asks, vec![(Price(100), Qty(10)), (Price(101), Qty(20))]);

        let bids = book.depth(Side::Bid, 5);
        assert_eq!(
            bids.iter().map(|(p, _)| p.raw()).collect::<Vec<_>>(),
            vec![92, 91, 90]
        );
    }

    #[test]
    fn test_clear() {
        let mut book = PriceLevelBook::new();
        book.apply_batch([bid(100, 50), ask(102, 30)]);

        book.clear();
        assert!(book.is_empty());
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
        assert!(book.spread().is_none());
        assert!(book.mid_price().is_none());
    }

    #[test]
    fn test_extreme_prices_do_not_overflow() {
        let mut book = PriceLevelBook::new();
        book.apply_batch([bid(i64::MIN, 1), ask(i64::MAX, 1)]);
        assert_eq!(book.spread(), None);
        assert_eq!(book.mid_price(), Some(0));
    }

    #[test]
    fn test_stored_levels_are_positive() {
        let mut book = PriceLevelBook::new();
        book.apply_batch([bid(1, 0), bid(2, 3), ask(5, 0), ask(6, 2), bid(2, 0)]);
        assert!(book.bids().iter().all(|(_, q)| !q.is_zero()));
        assert!(book.asks().iter().all(|(_, q)| !q.is_zero()));
        assert_eq!(book.bids().len(), 0);
        assert_eq!(book.asks().len(), 1);
    }
}
