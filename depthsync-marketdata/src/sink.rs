//! Downstream delivery of book events.

use crate::backoff::Backoff;
use crate::error::SyncError;
use crate::event::BookEvent;
use depthsync_channel::{ChannelError, MpscSender, SpscSender};
use depthsync_core::PairKey;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Non-blocking consumer end of the per-pair downstream queue.
pub trait BookSink {
    /// Hands one event over without blocking.
    ///
    /// # Errors
    /// Returns the event back inside [`ChannelError::Full`] when the queue has
    /// no room, or [`ChannelError::Disconnected`] when the consumer is gone.
    fn try_publish(&mut self, event: BookEvent) -> Result<(), ChannelError<BookEvent>>;
}

impl BookSink for SpscSender<BookEvent> {
    fn try_publish(&mut self, event: BookEvent) -> Result<(), ChannelError<BookEvent>> {
        self.try_send(event)
    }
}

impl BookSink for MpscSender<BookEvent> {
    fn try_publish(&mut self, event: BookEvent) -> Result<(), ChannelError<BookEvent>> {
        self.try_send(event)
    }
}

impl BookSink for Vec<BookEvent> {
    fn try_publish(&mut self, event: BookEvent) -> Result<(), ChannelError<BookEvent>> {
        self.push(event);
        Ok(())
    }
}

/// Retry policy for a full downstream queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishPolicy {
    /// Retries after the first failed attempt before a data event is dropped.
    pub max_retries: usize,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Longest wait between retries.
    pub max_delay: Duration,
    /// Growth factor per retry.
    pub multiplier: f64,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_micros(50),
            max_delay: Duration::from_millis(10),
            multiplier: 2.0,
        }
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishStats {
    /// Events handed to the sink.
    pub published: u64,
    /// Data events dropped on a saturated sink.
    pub dropped: u64,
    /// Failed attempts that were retried.
    pub retries: u64,
    /// `Clear` events held back because the sink stayed full.
    pub deferred_clears: u64,
}

/// Publishes events to a [`BookSink`] under a [`PublishPolicy`].
///
/// Every event gets the same bounded retry. A data event that still does not
/// fit is dropped whole. A `Clear` that does not fit is kept pending and is
/// delivered ahead of the next event; while it cannot be delivered, data
/// events are dropped rather than sent past it.
#[derive(Debug)]
pub struct Publisher<S> {
    sink: S,
    policy: PublishPolicy,
    stop: Arc<AtomicBool>,
    stats: PublishStats,
    pending_clear: Option<PairKey>,
}

impl<S: BookSink> Publisher<S> {
    /// Creates a publisher observing `stop` while retrying.
    #[must_use]
    pub fn new(sink: S, policy: PublishPolicy, stop: Arc<AtomicBool>) -> Self {
        Self {
            sink,
            policy,
            stop,
            stats: PublishStats::default(),
            pending_clear: None,
        }
    }

    /// Delivers `event`, retrying with backoff while the sink is full.
    ///
    /// A pending `Clear` goes out first. Returns within the policy's retry
    /// budget.
    ///
    /// # Errors
    /// [`SyncError::QueueSaturated`] if the event was dropped or, for a
    /// `Clear`, deferred. [`SyncError::SinkDisconnected`] if the consumer is
    /// gone.
    pub fn publish(&mut self, event: BookEvent) -> Result<(), SyncError> {
        if event.is_clear() {
            let pair = event.pair().clone();
            return match self.deliver(event) {
                Ok(()) => {
                    self.pending_clear = None;
                    Ok(())
                }
                Err(err @ SyncError::QueueSaturated { .. }) => {
                    self.defer_clear(pair, &err);
                    Err(err)
                }
                Err(err) => Err(err),
            };
        }

        if let Some(pair) = self.pending_clear.take() {
            if let Err(err) = self.deliver(BookEvent::Clear { pair: pair.clone() }) {
                if matches!(err, SyncError::QueueSaturated { .. }) {
                    self.pending_clear = Some(pair);
                    self.stats.dropped += 1;
                    tracing::warn!(
                        kind = event.kind(),
                        pair = %event.pair(),
                        "pending clear still undeliverable, event dropped"
                    );
                }
                return Err(err);
            }
            tracing::debug!(pair = %event.pair(), "pending clear delivered");
        }

        let kind = event.kind();
        let pair = event.pair().clone();
        let result = self.deliver(event);
        if let Err(SyncError::QueueSaturated { attempts }) = result {
            self.stats.dropped += 1;
            tracing::warn!(kind, %pair, attempts, "downstream queue saturated, event dropped");
        }
        result
    }

    /// Returns true while a `Clear` is waiting to be delivered.
    #[must_use]
    pub fn has_pending_clear(&self) -> bool {
        self.pending_clear.is_some()
    }

    fn defer_clear(&mut self, pair: PairKey, err: &SyncError) {
        if self.pending_clear.is_none() {
            self.stats.deferred_clears += 1;
        }
        tracing::warn!(%pair, error = %err, "downstream queue saturated, clear deferred");
        self.pending_clear = Some(pair);
    }

    fn deliver(&mut self, event: BookEvent) -> Result<(), SyncError> {
        let mut backoff = Backoff::new(
            self.policy.initial_delay,
            self.policy.max_delay,
            self.policy.multiplier,
        );
        let mut pending = event;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            match self.sink.try_publish(pending) {
                Ok(()) => {
                    self.stats.published += 1;
                    return Ok(());
                }
                Err(ChannelError::Disconnected(event)) => {
                    tracing::error!(kind = event.kind(), "downstream sink disconnected");
                    return Err(SyncError::SinkDisconnected);
                }
                Err(ChannelError::Full(event)) => {
                    if attempts > self.policy.max_retries || self.stop.load(Ordering::Acquire) {
                        return Err(SyncError::QueueSaturated { attempts });
                    }
                    self.stats.retries += 1;
                    std::thread::sleep(backoff.next_delay());
                    pending = event;
                }
            }
        }
    }

    /// Delivery counters.
    #[must_use]
    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    /// Borrows the sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutably borrows the sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consumes the publisher, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
