//! Fixed-point price/quantity types and book identity.
//!
//! Prices and quantities travel through the engine as scaled integers so the
//! book never compares floating point keys. Conversion from exchange text or
//! floats happens once, here, through a per-pair [`Precision`].

use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Largest number of decimal places whose scale factor fits in 64 bits.
pub const MAX_DECIMALS: u32 = 18;

/// Order book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// Bid (buy) side.
    Bid,
    /// Ask (sell) side.
    Ask,
}

impl Side {
    /// Returns the other side of the book.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

/// Fixed-point price, in units of `10^-price_decimals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Price(pub i64);

/// Fixed-point quantity, in units of `10^-qty_decimals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Qty(pub u64);

impl Price {
    /// Returns the raw scaled integer.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }
}

impl Qty {
    /// Zero quantity; as a level update it means "delete".
    pub const ZERO: Qty = Qty(0);

    /// Returns the raw scaled integer.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true for the zero quantity.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of decimal places used to scale a pair's prices and quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precision {
    /// Decimal places kept for prices.
    pub price_decimals: u32,
    /// Decimal places kept for quantities.
    pub qty_decimals: u32,
}

impl Precision {
    /// Creates a precision, rejecting scales whose factor overflows 64 bits.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidPrecision`] if either scale exceeds [`MAX_DECIMALS`].
    pub fn new(price_decimals: u32, qty_decimals: u32) -> Result<Self> {
        for decimals in [price_decimals, qty_decimals] {
            if decimals > MAX_DECIMALS {
                return Err(CoreError::InvalidPrecision {
                    decimals,
                    max: MAX_DECIMALS,
                });
            }
        }
        Ok(Self {
            price_decimals,
            qty_decimals,
        })
    }

    /// Parses an exchange price string such as `"27123.45"`.
    ///
    /// # Errors
    /// Returns an error if the text is not a decimal, carries more digits than
    /// `price_decimals`, or does not fit an `i64` mantissa.
    pub fn price(&self, text: &str) -> Result<Price> {
        let value = parse_decimal("price", text)?;
        let scaled = scale_exact("price", value, self.price_decimals)?;
        scaled
            .to_i64()
            .map(Price)
            .ok_or_else(|| CoreError::out_of_range("price", value))
    }

    /// Parses an exchange quantity string such as `"0.00150000"`.
    ///
    /// # Errors
    /// Returns an error if the text is not a decimal, is negative, carries more
    /// digits than `qty_decimals`, or does not fit a `u64` mantissa.
    pub fn qty(&self, text: &str) -> Result<Qty> {
        let value = parse_decimal("qty", text)?;
        if value < Decimal::ZERO {
            return Err(CoreError::Negative {
                field: "qty",
                value: value.to_string(),
            });
        }
        let scaled = scale_exact("qty", value, self.qty_decimals)?;
        scaled
            .to_u64()
            .map(Qty)
            .ok_or_else(|| CoreError::out_of_range("qty", value))
    }

    /// Converts a float price, rounding to the pair precision.
    ///
    /// # Errors
    /// Returns an error for NaN, infinities and values outside the `i64` range.
    pub fn price_from_f64(&self, value: f64) -> Result<Price> {
        let rounded = from_f64("price", value)?.round_dp(self.price_decimals);
        let scaled = scale_exact("price", rounded, self.price_decimals)?;
        scaled
            .to_i64()
            .map(Price)
            .ok_or_else(|| CoreError::out_of_range("price", value))
    }

    /// Converts a float quantity, rounding to the pair precision.
    ///
    /// # Errors
    /// Returns an error for NaN, infinities, negatives and values outside the
    /// `u64` range.
    pub fn qty_from_f64(&self, value: f64) -> Result<Qty> {
        if value < 0.0 {
            return Err(CoreError::Negative {
                field: "qty",
                value: value.to_string(),
            });
        }
        let rounded = from_f64("qty", value)?.round_dp(self.qty_decimals);
        let scaled = scale_exact("qty", rounded, self.qty_decimals)?;
        scaled
            .to_u64()
            .map(Qty)
            .ok_or_else(|| CoreError::out_of_range("qty", value))
    }

    /// Renders a fixed-point price back as a decimal.
    ///
    /// Returns `None` only when the precision was built by hand past [`MAX_DECIMALS`].
    #[must_use]
    pub fn price_to_decimal(&self, price: Price) -> Option<Decimal> {
        Decimal::try_from_i128_with_scale(i128::from(price.0), self.price_decimals).ok()
    }

    /// Renders a fixed-point quantity back as a decimal.
    #[must_use]
    pub fn qty_to_decimal(&self, qty: Qty) -> Option<Decimal> {
        Decimal::try_from_i128_with_scale(i128::from(qty.0), self.qty_decimals).ok()
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            price_decimals: 8,
            qty_decimals: 8,
        }
    }
}

fn parse_decimal(field: &'static str, text: &str) -> Result<Decimal> {
    Decimal::from_str_exact(text.trim()).map_err(|_| CoreError::invalid_decimal(field, text))
}

fn from_f64(field: &'static str, value: f64) -> Result<Decimal> {
    if !value.is_finite() {
        return Err(CoreError::NonFinite { field });
    }
    Decimal::try_from(value).map_err(|_| CoreError::out_of_range(field, value))
}

fn scale_exact(field: &'static str, value: Decimal, decimals: u32) -> Result<Decimal> {
    let factor = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or(CoreError::InvalidPrecision {
            decimals,
            max: MAX_DECIMALS,
        })?;
    let scaled = value
        .checked_mul(factor)
        .ok_or_else(|| CoreError::out_of_range(field, value))?;
    if !scaled.fract().is_zero() {
        return Err(CoreError::PrecisionLoss {
            field,
            value: value.to_string(),
            decimals,
        });
    }
    Ok(scaled)
}

/// Identity of one book: the exchange and the trading pair symbol.
///
/// Both halves are reference counted so events can carry the key by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    exchange: Arc<str>,
    symbol: Arc<str>,
}

impl PairKey {
    /// Creates a pair key.
    #[must_use]
    pub fn new(exchange: &str, symbol: &str) -> Self {
        Self {
            exchange: Arc::from(exchange),
            symbol: Arc::from(symbol),
        }
    }

    /// Exchange name.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Trading pair symbol as the exchange spells it.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}
