//! Error types for the sync engine.

use depthsync_core::CoreError;
use thiserror::Error;

/// Error taxonomy of the sync engine.
///
/// Every variant is handled inside the engine loop; none of them ends the
/// process.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad batch or snapshot shape. Dropped, no state change.
    #[error("malformed input: {0}")]
    MalformedInput(#[from] CoreError),

    /// Snapshot fetch or feed I/O failed. Retried on the next opportunity.
    #[error("transport failure: {message}")]
    TransportFailure {
        /// Error message.
        message: String,
    },

    /// Id discontinuity between consecutive batches. Triggers a resync.
    #[error("sequence gap: expected first id {expected}, received {received}")]
    SequenceGap {
        /// Id the next batch had to start at.
        expected: u64,
        /// Id it actually started at.
        received: u64,
    },

    /// Downstream queue stayed full past the retry budget.
    #[error("downstream queue saturated after {attempts} attempts")]
    QueueSaturated {
        /// Number of publish attempts made.
        attempts: usize,
    },

    /// Downstream consumer dropped its end of the queue.
    #[error("downstream sink disconnected")]
    SinkDisconnected,
}

impl SyncError {
    /// Creates a transport failure error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }
}

/// Result type alias for sync engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SyncError::SequenceGap {
            expected: 51,
            received: 52,
        };
        assert_eq!(
            err.to_string(),
            "sequence gap: expected first id 51, received 52"
        );

        let err = SyncError::transport("connection reset");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_from_core_error() {
        let err: SyncError = CoreError::InvertedRange {
            first_id: 9,
            last_id: 3,
        }
        .into();
        assert!(matches!(err, SyncError::MalformedInput(_)));
    }
}
