//! Error types for depthsync core operations.

use crate::types::Side;
use thiserror::Error;

/// Core error type, raised at the update-construction boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Text could not be parsed as a decimal number.
    #[error("invalid decimal for {field}: {value:?}")]
    InvalidDecimal {
        /// Field being parsed.
        field: &'static str,
        /// Offending input.
        value: String,
    },

    /// Floating point input was NaN or infinite.
    #[error("non-finite value for {field}")]
    NonFinite {
        /// Field being parsed.
        field: &'static str,
    },

    /// Negative value where only non-negative values are allowed.
    #[error("negative value for {field}: {value}")]
    Negative {
        /// Field being parsed.
        field: &'static str,
        /// Offending input.
        value: String,
    },

    /// Value does not fit the fixed-point representation.
    #[error("value out of range for {field}: {value}")]
    OutOfRange {
        /// Field being parsed.
        field: &'static str,
        /// Offending input.
        value: String,
    },

    /// Value carries more fractional digits than the pair precision allows.
    #[error("{field} {value} has more than {decimals} decimal places")]
    PrecisionLoss {
        /// Field being parsed.
        field: &'static str,
        /// Offending input.
        value: String,
        /// Configured number of decimal places.
        decimals: u32,
    },

    /// Requested precision exceeds what a 64-bit mantissa can hold.
    #[error("precision of {decimals} decimal places exceeds maximum {max}")]
    InvalidPrecision {
        /// Requested decimal places.
        decimals: u32,
        /// Maximum supported decimal places.
        max: u32,
    },

    /// Diff batch whose id range is inverted.
    #[error("inverted id range: first_id {first_id} > last_id {last_id}")]
    InvertedRange {
        /// First update id in the batch.
        first_id: u64,
        /// Last update id in the batch.
        last_id: u64,
    },

    /// A level update was filed under the wrong side.
    #[error("{actual:?} update found in {expected:?} levels")]
    SideMismatch {
        /// Side of the container holding the update.
        expected: Side,
        /// Side carried by the update.
        actual: Side,
    },
}

impl CoreError {
    /// Creates an invalid decimal error.
    pub fn invalid_decimal(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidDecimal {
            field,
            value: value.into(),
        }
    }

    /// Creates an out of range error.
    pub fn out_of_range(field: &'static str, value: impl ToString) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
        }
    }
}

/// Result type alias for depthsync core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
