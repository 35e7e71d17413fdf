//! # depthsync
//!
//! Gap-free local limit order books built from an exchange's REST snapshot
//! and its racing incremental diff stream.
//!
//! ## Features
//!
//! - **Snapshot/diff bridging** - Stitches a snapshot onto the diff stream by update id
//! - **Gap detection** - Any id discontinuity clears the book and resyncs
//! - **O(1) best bid/offer** - Cached top of each side
//! - **Fixed-point levels** - Exact decimal parsing into integer prices and quantities
//! - **One thread per pair** - Lock-free SPSC queues in and out of each engine
//!
//! ## Quick Start
//!
//! ```ignore
//! use depthsync::prelude::*;
//!
//! let pair = TradingPair::new("binance", "BTCUSDT", Precision::new(2, 8)?);
//! let parser = DepthParser::new(&pair);
//! let fetcher = HttpSnapshotFetcher::new(my_http_client, ExchangeConfig::binance(), parser.clone());
//!
//! let (feed_tx, feed_rx) = spsc::channel(4096);
//! let (event_tx, event_rx) = spsc::channel(4096);
//! let (engine, handle) = SyncEngineBuilder::for_pair(&pair).build(feed_rx, fetcher, event_tx);
//! let join = engine.spawn()?;
//!
//! tokio::spawn(async move { pump_stream(ws_frames, &parser, feed_tx, &PublishPolicy::default()).await });
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Fixed-point prices, level updates, diff batches, snapshots
//! - [`channel`] - SPSC and MPSC queues
//! - [`marketdata`] - Book, reconciler, sync engine
//! - [`exchange`] - Endpoint config, JSON parsing, snapshot fetching, feed pump
//! - [`logging`] - Tracing subscriber setup

pub mod logging;
pub mod prelude;

/// Fixed-point prices, level updates, diff batches and snapshots.
pub mod core {
    pub use depthsync_core::*;
}

/// SPSC and MPSC queues.
pub mod channel {
    pub use depthsync_channel::*;
}

/// Book, reconciler and sync engine.
pub mod marketdata {
    pub use depthsync_marketdata::*;
}

/// Exchange adapters.
pub mod exchange {
    pub use depthsync_exchange::*;
}

pub use depthsync_channel::{mpsc, spsc};
pub use depthsync_marketdata::{EngineHandle, SyncEngine, SyncEngineBuilder};

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use bytes::Bytes;
    use std::time::Duration;

    fn frame(first_id: u64, last_id: u64, bid: &str, qty: &str) -> Bytes {
        Bytes::from(format!(
            r#"{{"e":"depthUpdate","E":1,"s":"BTCUSDT","U":{first_id},"u":{last_id},"b":[["{bid}","{qty}"]],"a":[]}}"#
        ))
    }

    #[tokio::test]
    async fn test_stream_to_synced_book() {
        let pair = TradingPair::new("binance", "BTCUSDT", Precision::new(2, 4).unwrap());
        let parser = DepthParser::new(&pair);

        let http = |_: &str, _: Duration| -> depthsync_exchange::Result<HttpResponse> {
            Ok(HttpResponse::new(
                200,
                r#"{"lastUpdateId":12,"bids":[["100.00","1.5"]],"asks":[["100.50","2"]]}"#,
            ))
        };
        let fetcher = HttpSnapshotFetcher::new(http, ExchangeConfig::binance(), parser.clone());

        let (feed_tx, feed_rx) = spsc::channel(64);
        let (event_tx, mut event_rx) = spsc::channel(64);
        let (engine, handle) = SyncEngineBuilder::for_pair(&pair).build(feed_rx, fetcher, event_tx);
        let join = engine.spawn().unwrap();

        let frames = futures::stream::iter(vec![
            frame(10, 15, "99.50", "3"),
            Bytes::from_static(b"{\"e\":\"ping\"}"),
            frame(16, 16, "100.00", "0"),
        ]);
        pump_stream(frames, &parser, feed_tx, &PublishPolicy::default()).await;

        let summary = join.join().unwrap();
        assert_eq!(summary.exit, EngineExit::FeedClosed);
        assert_eq!(summary.state.phase, Phase::Synced);
        assert_eq!(summary.state.last_applied_id, Some(16));

        let top = handle.top_of_book();
        assert_eq!(top.best_bid, Some((Price(9_950), Qty(30_000))));
        assert_eq!(top.best_ask, Some((Price(10_050), Qty(20_000))));

        let kinds: Vec<&str> = event_rx.drain().map(|event| event.kind()).collect();
        assert_eq!(
            kinds,
            vec!["clear", "baseline", "diff", "top_of_book", "diff", "top_of_book"]
        );
    }
}
