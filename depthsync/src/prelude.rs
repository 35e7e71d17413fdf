//! Prelude module for convenient imports.
//!
//! ```ignore
//! use depthsync::prelude::*;
//! ```

// Core types
pub use depthsync_core::{
    CoreError, DiffBatch, PairKey, Precision, Price, PriceLevelUpdate, Qty, Side, Snapshot,
};

// Channel types
pub use depthsync_channel::{ChannelError, MpscReceiver, MpscSender, SpscReceiver, SpscSender};
pub use depthsync_channel::{mpsc, spsc};

// Book and engine types
pub use depthsync_marketdata::{
    BookEvent, BookSink, DiffSource, EngineConfig, EngineExit, EngineHandle, EngineSummary,
    IdleStrategy, PairRegistry, Phase, PriceLevelBook, PublishPolicy, ResyncBackoffConfig,
    SnapshotDiffReconciler, SnapshotFetcher, SyncEngine, SyncEngineBuilder, SyncError, TopOfBook,
    TradingPair,
};

// Exchange adapters
pub use depthsync_exchange::{
    DepthParser, ExchangeConfig, ExchangeError, HttpGet, HttpResponse, HttpSnapshotFetcher,
    Network, pump_stream,
};
