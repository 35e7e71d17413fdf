//! # depthsync Exchange
//!
//! Exchange-facing adapters feeding the sync engine.
//!
//! This crate provides:
//! - Injected endpoint configuration per exchange and network
//! - Depth-update and snapshot JSON decoding into fixed-point levels
//! - A REST [`SnapshotFetcher`](depthsync_marketdata::SnapshotFetcher) over a
//!   pluggable blocking HTTP client
//! - An async pump from a raw frame stream into the engine's diff queue

pub mod config;
pub mod error;
pub mod fetcher;
pub mod parse;
pub mod pump;

pub use config::{Endpoint, ExchangeConfig, Network, NetworkEndpoints};
pub use error::{ExchangeError, Result};
pub use fetcher::{HttpGet, HttpResponse, HttpSnapshotFetcher};
pub use parse::{DepthParser, ParsedDiff};
pub use pump::{PumpExit, PumpStats, pump_stream};
