//! Trading pair definitions and lookup.

use depthsync_core::{PairKey, Precision};
use std::collections::HashMap;

/// One tradable book the client keeps in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingPair {
    /// Book identity.
    pub key: PairKey,
    /// Fixed-point scaling for prices and quantities.
    pub precision: Precision,
    /// Snapshot depth requested on resync.
    pub snapshot_depth: u32,
    /// Whether the pair is currently tracked.
    pub is_active: bool,
}

impl TradingPair {
    /// Creates an active pair with the default snapshot depth.
    #[must_use]
    pub fn new(exchange: &str, symbol: &str, precision: Precision) -> Self {
        Self {
            key: PairKey::new(exchange, symbol),
            precision,
            snapshot_depth: 1000,
            is_active: true,
        }
    }

    /// Sets the snapshot depth.
    #[must_use]
    pub fn with_snapshot_depth(mut self, depth: u32) -> Self {
        self.snapshot_depth = depth;
        self
    }
}

/// Registry of tracked pairs across exchanges.
#[derive(Debug, Default)]
pub struct PairRegistry {
    pairs: HashMap<PairKey, TradingPair>,
}

impl PairRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a pair.
    pub fn add(&mut self, pair: TradingPair) -> Option<TradingPair> {
        self.pairs.insert(pair.key.clone(), pair)
    }

    /// Gets a pair by key.
    #[must_use]
    pub fn get(&self, key: &PairKey) -> Option<&TradingPair> {
        self.pairs.get(key)
    }

    /// Gets an active pair by exchange and symbol.
    #[must_use]
    pub fn lookup(&self, exchange: &str, symbol: &str) -> Option<&TradingPair> {
        self.pairs
            .get(&PairKey::new(exchange, symbol))
            .filter(|pair| pair.is_active)
    }

    /// Removes a pair.
    pub fn remove(&mut self, key: &PairKey) -> Option<TradingPair> {
        self.pairs.remove(key)
    }

    /// Returns the number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if no pair is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = &TradingPair> {
        self.pairs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn precision() -> Precision {
        Precision::new(2, 6).unwrap()
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = PairRegistry::new();
        registry.add(TradingPair::new("binance", "BTCUSDT", precision()).with_snapshot_depth(500));

        assert_eq!(registry.len(), 1);
        let pair = registry.lookup("binance", "BTCUSDT").unwrap();
        assert_eq!(pair.snapshot_depth, 500);
        assert_eq!(pair.precision.price_decimals, 2);
        assert!(registry.lookup("kraken", "BTCUSDT").is_none());
    }

    #[test]
    fn test_inactive_pair_hidden_from_lookup() {
        let mut registry = PairRegistry::new();
        let mut pair = TradingPair::new("binance", "ETHUSDT", precision());
        pair.is_active = false;
        let key = pair.key.clone();
        registry.add(pair);

        assert!(registry.lookup("binance", "ETHUSDT").is_none());
        assert!(registry.get(&key).is_some());
        assert!(registry.remove(&key).is_some());
        assert!(registry.is_empty());
    }
}
