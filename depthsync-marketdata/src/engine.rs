//! Per-pair sync engine driving the reconciler over a diff feed.
//!
//! One engine owns one book and one reconciler and runs on one thread. It is
//! the only mutator of both. Batches are processed strictly in delivery order.
//!
//! The engine blocks in two places: while idling for the next batch (spin, then
//! park according to [`IdleStrategy`]) and while a snapshot fetch is in flight.
//! The fetch is synchronous on purpose; diffs keep queueing upstream until it
//! returns, and the bridging test then sees them in order.

use crate::backoff::ResyncBackoffConfig;
use crate::book::PriceLevelBook;
use crate::error::{Result, SyncError};
use crate::event::{BookEvent, TopOfBook};
use crate::fetcher::SnapshotFetcher;
use crate::pairs::TradingPair;
use crate::reconciler::{
    Admission, BridgeOutcome, ReconcilerStats, ReconciliationState, ResyncTrigger,
    SnapshotDiffReconciler,
};
use crate::sink::{BookSink, PublishPolicy, PublishStats, Publisher};
use crate::source::{DiffSource, FeedPoll};
use depthsync_core::{DiffBatch, PairKey};
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How the engine waits when the feed has nothing queued.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct IdleStrategy {
    /// Empty polls answered with a CPU spin hint before parking.
    pub spin_limit: u32,
    /// Sleep per empty poll once the spin budget is spent.
    pub park: Duration,
}

impl Default for IdleStrategy {
    fn default() -> Self {
        Self {
            spin_limit: 128,
            park: Duration::from_micros(100),
        }
    }
}

impl IdleStrategy {
    /// Busy-spins forever; lowest latency, one core per engine.
    #[must_use]
    pub fn busy_spin() -> Self {
        Self {
            spin_limit: u32::MAX,
            park: Duration::ZERO,
        }
    }

    #[inline]
    fn idle(&self, empty_polls: &mut u32) {
        if *empty_polls < self.spin_limit {
            *empty_polls += 1;
            std::hint::spin_loop();
        } else if self.park.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.park);
        }
    }
}

/// Engine settings loadable from any serde format.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Levels per side requested from the snapshot fetcher.
    pub depth: u32,
    /// Wait strategy on an empty feed.
    pub idle: IdleStrategy,
    /// Retry policy on a full downstream queue.
    pub publish: PublishPolicy,
    /// Throttle for repeated snapshot fetches.
    pub resync_backoff: ResyncBackoffConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            depth: 1000,
            idle: IdleStrategy::default(),
            publish: PublishPolicy::default(),
            resync_backoff: ResyncBackoffConfig::default(),
        }
    }
}

/// Why [`SyncEngine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    /// [`EngineHandle::stop`] was called.
    Stopped,
    /// The diff feed closed and was drained.
    FeedClosed,
    /// The downstream consumer went away.
    SinkClosed,
}

/// Counters of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    /// Batches pulled from the feed.
    pub batches_received: u64,
    /// Reconciler counters.
    pub reconciler: ReconcilerStats,
    /// Downstream delivery counters.
    pub publish: PublishStats,
}

/// Final report returned by [`SyncEngine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSummary {
    /// Exit reason.
    pub exit: EngineExit,
    /// Counters at exit.
    pub stats: EngineStats,
    /// Reconciliation state at exit.
    pub state: ReconciliationState,
}

/// Builder for configuring and creating a sync engine.
#[derive(Debug, Clone)]
pub struct SyncEngineBuilder {
    pair: PairKey,
    config: EngineConfig,
}

impl SyncEngineBuilder {
    /// Creates a builder for `pair` with default settings.
    #[must_use]
    pub fn new(pair: PairKey) -> Self {
        Self {
            pair,
            config: EngineConfig::default(),
        }
    }

    /// Creates a builder from a registered trading pair.
    #[must_use]
    pub fn for_pair(pair: &TradingPair) -> Self {
        Self::new(pair.key.clone()).depth(pair.snapshot_depth)
    }

    /// Replaces all settings.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the snapshot depth.
    #[must_use]
    pub fn depth(mut self, depth: u32) -> Self {
        self.config.depth = depth;
        self
    }

    /// Sets the idle strategy.
    #[must_use]
    pub fn idle(mut self, idle: IdleStrategy) -> Self {
        self.config.idle = idle;
        self
    }

    /// Sets the downstream retry policy.
    #[must_use]
    pub fn publish_policy(mut self, policy: PublishPolicy) -> Self {
        self.config.publish = policy;
        self
    }

    /// Sets the resync backoff.
    #[must_use]
    pub fn resync_backoff(mut self, backoff: ResyncBackoffConfig) -> Self {
        self.config.resync_backoff = backoff;
        self
    }

    /// Builds the engine and its control handle.
    pub fn build<Src, F, S>(
        self,
        source: Src,
        fetcher: F,
        sink: S,
    ) -> (SyncEngine<Src, F, S>, EngineHandle)
    where
        Src: DiffSource,
        F: SnapshotFetcher,
        S: BookSink,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let top = Arc::new(RwLock::new(TopOfBook::default()));

        let engine = SyncEngine {
            reconciler: SnapshotDiffReconciler::new(&self.config.resync_backoff),
            publisher: Publisher::new(sink, self.config.publish.clone(), Arc::clone(&stop)),
            pair: self.pair,
            depth: self.config.depth,
            idle: self.config.idle,
            source,
            fetcher,
            book: PriceLevelBook::new(),
            batches_received: 0,
            downstream_cleared: false,
            stop: Arc::clone(&stop),
            top: Arc::clone(&top),
        };
        let handle = EngineHandle { stop, top };

        (engine, handle)
    }
}

/// Cloneable control handle of a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    stop: Arc<AtomicBool>,
    top: Arc<RwLock<TopOfBook>>,
}

impl EngineHandle {
    /// Asks the engine to stop at the top of its next iteration.
    ///
    /// An in-flight snapshot fetch is not interrupted.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Returns true until [`Self::stop`] is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
    }

    /// Latest BBO of the engine's book. Empty while unsynced.
    #[must_use]
    pub fn top_of_book(&self) -> TopOfBook {
        *self.top.read()
    }
}

/// Single-pair engine: diff feed in, book events out.
pub struct SyncEngine<Src, F, S> {
    pair: PairKey,
    depth: u32,
    idle: IdleStrategy,
    source: Src,
    fetcher: F,
    publisher: Publisher<S>,
    book: PriceLevelBook,
    reconciler: SnapshotDiffReconciler,
    batches_received: u64,
    // A Clear was published or deferred and no data event followed it.
    downstream_cleared: bool,
    stop: Arc<AtomicBool>,
    top: Arc<RwLock<TopOfBook>>,
}

impl<Src, F, S> SyncEngine<Src, F, S>
where
    Src: DiffSource,
    F: SnapshotFetcher,
    S: BookSink,
{
    /// Runs until stopped, the feed closes, or the sink disconnects.
    pub fn run(&mut self) -> EngineSummary {
        let span = tracing::info_span!("sync_engine", pair = %self.pair);
        let _enter = span.enter();
        tracing::info!(depth = self.depth, "sync engine started");

        let mut empty_polls = 0u32;
        let exit = loop {
            if self.stop.load(Ordering::Acquire) {
                break EngineExit::Stopped;
            }
            match self.source.poll_batch() {
                FeedPoll::Batch(batch) => {
                    empty_polls = 0;
                    if let Err(err) = self.process(batch) {
                        tracing::error!(error = %err, "stopping sync engine");
                        break EngineExit::SinkClosed;
                    }
                }
                FeedPoll::Idle => self.idle.idle(&mut empty_polls),
                FeedPoll::Closed => break EngineExit::FeedClosed,
            }
        };

        let summary = self.summary(exit);
        tracing::info!(
            exit = ?summary.exit,
            batches = summary.stats.batches_received,
            resyncs = summary.stats.reconciler.resyncs,
            "sync engine stopped"
        );
        summary
    }

    /// Handles one batch.
    ///
    /// # Errors
    /// Only [`SyncError::SinkDisconnected`]; every other failure is handled
    /// here and leaves the engine runnable.
    pub fn process(&mut self, batch: DiffBatch) -> Result<()> {
        self.batches_received += 1;

        if let Err(err) = batch.validate() {
            self.reconciler.record_malformed();
            tracing::error!(
                first_id = batch.first_id,
                last_id = batch.last_id,
                error = %err,
                "malformed batch dropped"
            );
            return Ok(());
        }

        match self.reconciler.admit(&batch) {
            Admission::Apply => self.forward(batch),
            Admission::Resync(trigger) => self.resync(batch, trigger),
            Admission::Rejected(_) => Ok(()),
        }
    }

    /// Stops the run loop at its next iteration.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Returns a new handle onto this engine.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            stop: Arc::clone(&self.stop),
            top: Arc::clone(&self.top),
        }
    }

    /// The local book. Only trustworthy while [`Self::is_synced`].
    #[must_use]
    pub fn book(&self) -> &PriceLevelBook {
        &self.book
    }

    /// Pair this engine tracks.
    #[must_use]
    pub fn pair(&self) -> &PairKey {
        &self.pair
    }

    /// Reconciliation state.
    #[must_use]
    pub fn state(&self) -> ReconciliationState {
        self.reconciler.state()
    }

    /// Returns true if the book can be trusted.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.reconciler.is_synced()
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            batches_received: self.batches_received,
            reconciler: self.reconciler.stats(),
            publish: self.publisher.stats(),
        }
    }

    /// Borrows the downstream sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        self.publisher.sink()
    }

    fn summary(&self, exit: EngineExit) -> EngineSummary {
        EngineSummary {
            exit,
            stats: self.stats(),
            state: self.reconciler.state(),
        }
    }

    fn resync(&mut self, batch: DiffBatch, trigger: ResyncTrigger) -> Result<()> {
        tracing::debug!(?trigger, "resync started");
        self.book.clear();
        *self.top.write() = TopOfBook::default();

        if self.downstream_cleared {
            tracing::trace!("downstream already cleared");
        } else {
            match self.publisher.publish(BookEvent::Clear {
                pair: self.pair.clone(),
            }) {
                // A deferred Clear is sent ahead of the next event.
                Ok(()) | Err(SyncError::QueueSaturated { .. }) => self.downstream_cleared = true,
                Err(err) => return Err(err),
            }
        }

        if !self.reconciler.begin_fetch(Instant::now()) {
            return Ok(());
        }

        let fetched = self.fetcher.fetch(&self.pair, self.depth);
        match self.reconciler.complete_fetch(&batch, fetched, Instant::now()) {
            BridgeOutcome::Bridged(snapshot) => {
                let last_update_id = snapshot.last_update_id;
                let levels = snapshot.into_levels();
                self.book.apply_batch(levels.iter().copied());

                let baseline = BookEvent::Baseline {
                    pair: self.pair.clone(),
                    last_update_id,
                    levels,
                };
                if self.publish_data(baseline)? {
                    self.forward(batch)
                } else {
                    Ok(())
                }
            }
            BridgeOutcome::FetchFailed(err) => {
                tracing::warn!(error = %err, "snapshot fetch failed, retrying on next diff");
                Ok(())
            }
            BridgeOutcome::StaleDiff { .. } | BridgeOutcome::StaleSnapshot { .. } => Ok(()),
        }
    }

    fn forward(&mut self, batch: DiffBatch) -> Result<()> {
        self.book.apply_batch(batch.updates());
        let top = TopOfBook {
            best_bid: self.book.best_bid(),
            best_ask: self.book.best_ask(),
        };
        *self.top.write() = top;

        let diff = BookEvent::Diff {
            pair: self.pair.clone(),
            first_id: batch.first_id,
            last_id: batch.last_id,
            levels: batch.into_updates(),
        };
        if !self.publish_data(diff)? {
            return Ok(());
        }

        match self.publisher.publish(BookEvent::TopOfBook {
            pair: self.pair.clone(),
            top,
        }) {
            // The next BBO supersedes a dropped one.
            Ok(()) | Err(SyncError::QueueSaturated { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Publishes a level-carrying event. Returns false if it was dropped, in
    /// which case downstream has lost continuity and a resync is forced.
    fn publish_data(&mut self, event: BookEvent) -> Result<bool> {
        match self.publisher.publish(event) {
            Ok(()) => {
                self.downstream_cleared = false;
                Ok(true)
            }
            Err(SyncError::QueueSaturated { .. }) => {
                self.reconciler.invalidate();
                *self.top.write() = TopOfBook::default();
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

impl<Src, F, S> SyncEngine<Src, F, S>
where
    Src: DiffSource + Send + 'static,
    F: SnapshotFetcher + Send + 'static,
    S: BookSink + Send + 'static,
{
    /// Runs the engine on a dedicated named thread.
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be created.
    pub fn spawn(mut self) -> std::io::Result<JoinHandle<EngineSummary>> {
        let name = format!("depthsync-{}-{}", self.pair.exchange(), self.pair.symbol());
        std::thread::Builder::new()
            .name(name)
            .spawn(move || self.run())
    }
}
