//! Depth-update and snapshot JSON decoding.
//!
//! Diff frames look like
//! `{"e":"depthUpdate","E":..,"s":"BNBBTC","U":157,"u":160,"b":[["0.0024","10"]],"a":[..]}`,
//! optionally wrapped as `{"stream":"..","data":{..}}` on combined streams.
//! Snapshot bodies look like `{"lastUpdateId":1027024,"bids":[..],"asks":[..]}`.
//! Levels are `[price, qty]` pairs of decimal strings.

use crate::error::{ExchangeError, Result};
use depthsync_core::{DiffBatch, PriceLevelUpdate, Precision, Side, Snapshot};
use depthsync_marketdata::{PairRegistry, TradingPair};
use serde::Deserialize;

const DEPTH_UPDATE: &str = "depthUpdate";

type RawLevel<'a> = (&'a str, &'a str);

#[derive(Deserialize)]
struct RawDepthUpdate<'a> {
    #[serde(rename = "e", borrow)]
    event: &'a str,
    #[serde(rename = "E", default)]
    event_time: u64,
    #[serde(rename = "s", borrow)]
    symbol: &'a str,
    #[serde(rename = "U")]
    first_id: u64,
    #[serde(rename = "u")]
    last_id: u64,
    #[serde(rename = "b", borrow)]
    bids: Vec<RawLevel<'a>>,
    #[serde(rename = "a", borrow)]
    asks: Vec<RawLevel<'a>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrame<'a> {
    Combined {
        #[serde(borrow)]
        data: RawDepthUpdate<'a>,
    },
    Plain(#[serde(borrow)] RawDepthUpdate<'a>),
}

#[derive(Deserialize)]
struct RawSnapshot<'a> {
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,
    #[serde(borrow)]
    bids: Vec<RawLevel<'a>>,
    #[serde(borrow)]
    asks: Vec<RawLevel<'a>>,
}

/// A decoded diff frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDiff {
    /// Symbol the frame belongs to.
    pub symbol: String,
    /// Exchange event time in milliseconds.
    pub event_time: u64,
    /// Validated batch.
    pub batch: DiffBatch,
}

/// Decodes depth JSON of one pair into fixed-point batches and snapshots.
#[derive(Debug, Clone)]
pub struct DepthParser {
    exchange: String,
    symbol: String,
    precision: Precision,
}

impl DepthParser {
    /// Creates a parser for one pair.
    #[must_use]
    pub fn new(pair: &TradingPair) -> Self {
        Self {
            exchange: pair.key.exchange().to_string(),
            symbol: pair.key.symbol().to_uppercase(),
            precision: pair.precision,
        }
    }

    /// Creates a parser for a registered pair.
    ///
    /// # Errors
    /// Returns [`ExchangeError::UnknownPair`] if the pair is not registered or
    /// not active.
    pub fn from_registry(registry: &PairRegistry, exchange: &str, symbol: &str) -> Result<Self> {
        registry
            .lookup(exchange, symbol)
            .map(Self::new)
            .ok_or_else(|| ExchangeError::UnknownPair {
                exchange: exchange.to_string(),
                symbol: symbol.to_string(),
            })
    }

    /// Scaling in use.
    #[must_use]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Decodes one diff frame.
    ///
    /// # Errors
    /// JSON shape errors, foreign event types or symbols, unconvertible
    /// levels, and inverted id ranges.
    pub fn parse_diff(&self, raw: &[u8]) -> Result<ParsedDiff> {
        let update = match serde_json::from_slice::<RawFrame<'_>>(raw)? {
            RawFrame::Combined { data } | RawFrame::Plain(data) => data,
        };

        if update.event != DEPTH_UPDATE {
            return Err(ExchangeError::UnexpectedEvent {
                event: update.event.to_string(),
            });
        }
        if !update.symbol.eq_ignore_ascii_case(&self.symbol) {
            return Err(ExchangeError::UnknownPair {
                exchange: self.exchange.clone(),
                symbol: update.symbol.to_string(),
            });
        }

        let batch = DiffBatch::new(
            update.first_id,
            update.last_id,
            self.levels(Side::Bid, &update.bids)?,
            self.levels(Side::Ask, &update.asks)?,
        );
        batch.validate()?;

        Ok(ParsedDiff {
            symbol: update.symbol.to_string(),
            event_time: update.event_time,
            batch,
        })
    }

    /// Decodes a REST snapshot body.
    ///
    /// # Errors
    /// JSON shape errors and unconvertible levels.
    pub fn parse_snapshot(&self, raw: &[u8]) -> Result<Snapshot> {
        let snapshot: RawSnapshot<'_> = serde_json::from_slice(raw)?;
        Ok(Snapshot::new(
            snapshot.last_update_id,
            self.levels(Side::Bid, &snapshot.bids)?,
            self.levels(Side::Ask, &snapshot.asks)?,
        ))
    }

    fn levels(&self, side: Side, raw: &[RawLevel<'_>]) -> Result<Vec<PriceLevelUpdate>> {
        raw.iter()
            .map(|(price, qty)| -> Result<PriceLevelUpdate> {
                Ok(PriceLevelUpdate::new(
                    side,
                    self.precision.price(price)?,
                    self.precision.qty(qty)?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthsync_core::{CoreError, Price, Qty};

    fn parser() -> DepthParser {
        DepthParser::new(&TradingPair::new(
            "binance",
            "BNBBTC",
            Precision::new(8, 2).unwrap(),
        ))
    }

    #[test]
    fn test_parse_diff() {
        let raw = br#"{"e":"depthUpdate","E":1672515782136,"s":"BNBBTC","U":157,"u":160,
            "b":[["0.0024","10"],["0.0023","0"]],"a":[["0.0026","100"]]}"#;
        let parsed = parser().parse_diff(raw).unwrap();

        assert_eq!(parsed.symbol, "BNBBTC");
        assert_eq!(parsed.event_time, 1_672_515_782_136);
        assert_eq!(parsed.batch.first_id, 157);
        assert_eq!(parsed.batch.last_id, 160);
        assert_eq!(
            parsed.batch.bids,
            vec![
                PriceLevelUpdate::new(Side::Bid, Price(240_000), Qty(1_000)),
                PriceLevelUpdate::new(Side::Bid, Price(230_000), Qty(0)),
            ]
        );
        assert_eq!(parsed.batch.asks[0].price, Price(260_000));
    }

    #[test]
    fn test_parse_combined_stream_frame() {
        let raw = br#"{"stream":"bnbbtc@depth@100ms","data":{"e":"depthUpdate","E":1,"s":"BNBBTC","U":5,"u":5,"b":[],"a":[["0.0026","1.5"]]}}"#;
        let parsed = parser().parse_diff(raw).unwrap();
        assert_eq!(parsed.batch.first_id, 5);
        assert_eq!(parsed.batch.asks[0].qty, Qty(150));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            parser().parse_diff(b"{\"e\":\"depthUpdate\",\"U\":"),
            Err(ExchangeError::Json(_))
        ));
        assert!(parser().parse_diff(b"[1,2,3]").is_err());
    }

    #[test]
    fn test_foreign_event_and_symbol() {
        let trade = br#"{"e":"trade","E":1,"s":"BNBBTC","U":1,"u":1,"b":[],"a":[]}"#;
        assert!(matches!(
            parser().parse_diff(trade),
            Err(ExchangeError::UnexpectedEvent { ref event }) if event == "trade"
        ));

        let other = br#"{"e":"depthUpdate","E":1,"s":"ETHBTC","U":1,"u":1,"b":[],"a":[]}"#;
        assert!(matches!(
            parser().parse_diff(other),
            Err(ExchangeError::UnknownPair { .. })
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let raw = br#"{"e":"depthUpdate","E":1,"s":"BNBBTC","U":9,"u":3,"b":[],"a":[]}"#;
        assert!(matches!(
            parser().parse_diff(raw),
            Err(ExchangeError::Core(CoreError::InvertedRange { .. }))
        ));
    }

    #[test]
    fn test_precision_loss_rejected() {
        let raw = br#"{"e":"depthUpdate","E":1,"s":"BNBBTC","U":1,"u":1,"b":[["0.0024","1.005"]],"a":[]}"#;
        assert!(matches!(
            parser().parse_diff(raw),
            Err(ExchangeError::Core(CoreError::PrecisionLoss { .. }))
        ));
    }

    #[test]
    fn test_parse_snapshot() {
        let raw = br#"{"lastUpdateId":1027024,"bids":[["4.00000000","431.00000000"]],"asks":[["4.00000200","12.00000000"]]}"#;
        let snapshot = parser().parse_snapshot(raw).unwrap();

        assert_eq!(snapshot.last_update_id, 1_027_024);
        assert_eq!(snapshot.bids[0].price, Price(400_000_000));
        assert_eq!(snapshot.bids[0].qty, Qty(43_100));
        assert_eq!(snapshot.asks[0].price, Price(400_000_200));
        snapshot.validate().unwrap();
    }

    #[test]
    fn test_from_registry() {
        let mut registry = PairRegistry::new();
        registry.add(TradingPair::new("binance", "BNBBTC", Precision::default()));

        assert!(DepthParser::from_registry(&registry, "binance", "BNBBTC").is_ok());
        assert!(matches!(
            DepthParser::from_registry(&registry, "binance", "XRPBTC"),
            Err(ExchangeError::UnknownPair { .. })
        ));
    }
}
