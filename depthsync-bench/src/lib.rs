//! # depthsync Bench
//!
//! Benchmarking utilities for depthsync performance testing.

pub mod feed;

pub use feed::{Discard, FeedConfig, SyntheticFeed};
