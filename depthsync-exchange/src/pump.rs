//! Moves raw stream frames into an engine's diff queue.

use crate::parse::DepthParser;
use bytes::Bytes;
use depthsync_channel::{ChannelError, SpscSender};
use depthsync_core::DiffBatch;
use depthsync_marketdata::{Backoff, PublishPolicy};
use futures::{Stream, StreamExt};

/// Counters of one pump run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpStats {
    /// Frames received from the stream.
    pub frames: u64,
    /// Batches handed to the engine.
    pub forwarded: u64,
    /// Frames that failed to decode.
    pub malformed: u64,
    /// Batches dropped on a full queue.
    pub dropped: u64,
}

/// Why [`pump_stream`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The frame stream ended.
    StreamEnded,
    /// The engine dropped its end of the queue.
    EngineGone,
}

/// Decodes every frame of `frames` and forwards it to the engine.
///
/// Undecodable frames are dropped with a warning before they reach the
/// engine. When the queue stays full past `policy`, the batch is dropped; the
/// engine sees the id gap on the next batch and resyncs. Dropping `tx` on
/// return closes the engine's feed.
pub async fn pump_stream<St>(
    mut frames: St,
    parser: &DepthParser,
    mut tx: SpscSender<DiffBatch>,
    policy: &PublishPolicy,
) -> (PumpExit, PumpStats)
where
    St: Stream<Item = Bytes> + Unpin,
{
    let mut stats = PumpStats::default();

    while let Some(frame) = frames.next().await {
        stats.frames += 1;

        let batch = match parser.parse_diff(&frame) {
            Ok(parsed) => parsed.batch,
            Err(err) => {
                stats.malformed += 1;
                tracing::warn!(error = %err, len = frame.len(), "dropping undecodable frame");
                continue;
            }
        };

        let mut backoff = Backoff::new(policy.initial_delay, policy.max_delay, policy.multiplier);
        let mut pending = batch;
        loop {
            match tx.try_send(pending) {
                Ok(()) => {
                    stats.forwarded += 1;
                    break;
                }
                Err(ChannelError::Disconnected(_)) => {
                    tracing::info!("engine queue closed, stopping pump");
                    return (PumpExit::EngineGone, stats);
                }
                Err(ChannelError::Full(batch)) => {
                    if backoff.attempts() >= policy.max_retries {
                        stats.dropped += 1;
                        tracing::warn!(
                            first_id = batch.first_id,
                            last_id = batch.last_id,
                            "engine queue saturated, batch dropped"
                        );
                        break;
                    }
                    tokio::time::sleep(backoff.next_delay()).await;
                    pending = batch;
                }
            }
        }
    }

    tracing::debug!(?stats, "frame stream ended");
    (PumpExit::StreamEnded, stats)
}
