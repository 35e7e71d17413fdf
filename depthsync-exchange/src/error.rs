//! Error types for exchange adapters.

use depthsync_core::CoreError;
use depthsync_marketdata::SyncError;
use thiserror::Error;

/// Error type for exchange adapter operations.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Body is not the expected JSON shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A price or quantity could not be converted.
    #[error("invalid level: {0}")]
    Core(#[from] CoreError),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Start of the response body.
        message: String,
    },

    /// Network-level failure reported by the HTTP collaborator.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// Stream message of a different event type.
    #[error("unexpected event type: {event}")]
    UnexpectedEvent {
        /// Event type found.
        event: String,
    },

    /// Message for a symbol this parser does not handle.
    #[error("unknown pair: {exchange}:{symbol}")]
    UnknownPair {
        /// Exchange name.
        exchange: String,
        /// Symbol found.
        symbol: String,
    },

    /// No endpoints configured for the selected network.
    #[error("no endpoints configured for {network}")]
    NetworkUnavailable {
        /// Network name.
        network: &'static str,
    },
}

impl ExchangeError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

impl From<ExchangeError> for SyncError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Core(core) => SyncError::MalformedInput(core),
            other => SyncError::transport(other.to_string()),
        }
    }
}

/// Result type alias for exchange adapter operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_sync_error() {
        let err: SyncError = ExchangeError::Http {
            status: 429,
            message: "too many requests".to_string(),
        }
        .into();
        assert!(matches!(err, SyncError::TransportFailure { ref message } if message.contains("429")));

        let err: SyncError = ExchangeError::Core(CoreError::NonFinite { field: "price" }).into();
        assert!(matches!(err, SyncError::MalformedInput(_)));
    }
}
