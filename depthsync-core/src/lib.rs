//! # depthsync Core
//!
//! Value types shared by every depthsync crate.
//!
//! This crate provides:
//! - Fixed-point [`Price`] and [`Qty`] scaled by a per-pair [`Precision`]
//! - [`PriceLevelUpdate`], the absolute-replace level mutation
//! - [`DiffBatch`] and [`Snapshot`], the two inputs of the sync engine
//! - [`PairKey`], the (exchange, symbol) identity of a book

pub mod error;
pub mod types;
pub mod update;

pub use error::{CoreError, Result};
pub use types::{PairKey, Precision, Price, Qty, Side};
pub use update::{DiffBatch, PriceLevelUpdate, Snapshot};
