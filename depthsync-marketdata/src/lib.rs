//! # depthsync Market Data
//!
//! Keeps a local limit order book consistent with an exchange by stitching a
//! full-state snapshot onto a racing incremental diff feed.
//!
//! This crate provides:
//! - Price level books with O(1) best bid/offer
//! - The snapshot/diff reconciliation state machine
//! - A per-pair sync engine with builder, control handle and event publishing
//! - Trading pair registry

pub mod backoff;
pub mod book;
pub mod engine;
pub mod error;
pub mod event;
pub mod fetcher;
pub mod pairs;
pub mod reconciler;
pub mod sink;
pub mod source;

pub use backoff::{Backoff, ResyncBackoffConfig};
pub use book::{BookSide, PriceLevelBook};
pub use engine::{
    EngineConfig, EngineExit, EngineHandle, EngineStats, EngineSummary, IdleStrategy, SyncEngine,
    SyncEngineBuilder,
};
pub use error::{Result, SyncError};
pub use event::{BookEvent, TopOfBook};
pub use fetcher::SnapshotFetcher;
pub use pairs::{PairRegistry, TradingPair};
pub use reconciler::{
    Admission, BridgeOutcome, Phase, ReconcilerStats, ReconciliationState, ResyncTrigger,
    SnapshotDiffReconciler,
};
pub use sink::{BookSink, PublishPolicy, PublishStats, Publisher};
pub use source::{DiffSource, FeedPoll};
