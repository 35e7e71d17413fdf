//! Deterministic synthetic depth feeds.

use depthsync_channel::ChannelError;
use depthsync_core::{DiffBatch, PriceLevelUpdate, Snapshot};
use depthsync_marketdata::{BookEvent, BookSink};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape of a synthetic feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Levels per side in the snapshot and the band diffs touch.
    pub levels_per_side: usize,
    /// Level updates per diff batch.
    pub updates_per_batch: usize,
    /// Fixed-point mid price the book is centred on.
    pub mid: i64,
    /// Fixed-point tick size.
    pub tick: i64,
    /// Share of updates that delete their level.
    pub delete_ratio: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            levels_per_side: 1000,
            updates_per_batch: 20,
            mid: 2_700_000,
            tick: 1,
            delete_ratio: 0.2,
            seed: 7,
        }
    }
}

/// Generates a snapshot and a contiguous stream of diff batches after it.
#[derive(Debug)]
pub struct SyntheticFeed {
    config: FeedConfig,
    rng: StdRng,
    next_id: u64,
}

impl SyntheticFeed {
    /// Creates a feed whose first batch starts at id 1.
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            next_id: 1,
        }
    }

    /// First id of the next batch.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Full book as of the last generated id.
    pub fn snapshot(&mut self) -> Snapshot {
        let config = &self.config;
        let rng = &mut self.rng;
        let bids = (0..config.levels_per_side)
            .map(|i| PriceLevelUpdate::bid(bid_price(config, i), rng.gen_range(1..10_000)))
            .collect();
        let asks = (0..config.levels_per_side)
            .map(|i| PriceLevelUpdate::ask(ask_price(config, i), rng.gen_range(1..10_000)))
            .collect();
        Snapshot::new(self.next_id.saturating_sub(1), bids, asks)
    }

    /// Next contiguous batch; covers one id per update.
    pub fn next_batch(&mut self) -> DiffBatch {
        let count = self.config.updates_per_batch.max(1);
        let mut bids = Vec::with_capacity(count);
        let mut asks = Vec::with_capacity(count);

        for _ in 0..count {
            let offset = self.rng.gen_range(0..self.config.levels_per_side.max(1));
            let qty = if self.rng.gen_bool(self.config.delete_ratio) {
                0
            } else {
                self.rng.gen_range(1..10_000)
            };
            if self.rng.gen_bool(0.5) {
                bids.push(PriceLevelUpdate::bid(bid_price(&self.config, offset), qty));
            } else {
                asks.push(PriceLevelUpdate::ask(ask_price(&self.config, offset), qty));
            }
        }

        let first_id = self.next_id;
        self.next_id += count as u64;
        DiffBatch::new(first_id, self.next_id - 1, bids, asks)
    }

    /// Generates `n` contiguous batches.
    pub fn batches(&mut self, n: usize) -> Vec<DiffBatch> {
        (0..n).map(|_| self.next_batch()).collect()
    }

    /// Skips `ids` update ids, producing a gap before the next batch.
    pub fn skip(&mut self, ids: u64) {
        self.next_id += ids;
    }
}

fn bid_price(config: &FeedConfig, offset: usize) -> i64 {
    config.mid - config.tick * (offset as i64 + 1)
}

fn ask_price(config: &FeedConfig, offset: usize) -> i64 {
    config.mid + config.tick * (offset as i64 + 1)
}

/// Sink that accepts and discards every event.
#[derive(Debug, Default)]
pub struct Discard {
    /// Events accepted.
    pub count: u64,
}

impl BookSink for Discard {
    fn try_publish(&mut self, event: BookEvent) -> Result<(), ChannelError<BookEvent>> {
        std::hint::black_box(event);
        self.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_are_contiguous() {
        let mut feed = SyntheticFeed::new(FeedConfig::default());
        let batches = feed.batches(10);

        for pair in batches.windows(2) {
            assert_eq!(pair[1].first_id, pair[0].last_id + 1);
        }
        for batch in &batches {
            batch.validate().unwrap();
            assert_eq!(batch.len(), 20);
        }
    }

    #[test]
    fn test_snapshot_bridges_next_batch() {
        let mut feed = SyntheticFeed::new(FeedConfig::default());
        feed.batches(3);
        let snapshot = feed.snapshot();
        let next = feed.next_batch();

        assert_eq!(snapshot.last_update_id + 1, next.first_id);
        snapshot.validate().unwrap();
        assert_eq!(snapshot.bids.len(), 1000);
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = SyntheticFeed::new(FeedConfig::default()).next_batch();
        let b = SyntheticFeed::new(FeedConfig::default()).next_batch();
        assert_eq!(a, b);
    }

    #[test]
    fn test_skip_creates_gap() {
        let mut feed = SyntheticFeed::new(FeedConfig::default());
        let first = feed.next_batch();
        feed.skip(5);
        assert_eq!(feed.next_batch().first_id, first.last_id + 6);
    }
}
