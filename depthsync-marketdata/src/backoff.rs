//! Exponential backoff shared by downstream publishing and snapshot resyncs.

use serde::Deserialize;
use std::time::{Duration, Instant};

/// Upper bound on a single resync wait, whatever the configuration says.
const MAX_RESYNC_DELAY: Duration = Duration::from_secs(3600);

/// Exponential delay sequence capped at a maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    current_delay: Duration,
    attempts: usize,
}

impl Backoff {
    /// Creates a backoff starting at `initial_delay`.
    #[must_use]
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
            current_delay: initial_delay.min(max_delay),
            attempts: 0,
        }
    }

    /// Returns the delay for this attempt and grows the next one.
    pub fn next_delay(&mut self) -> Duration {
        self.attempts += 1;
        let delay = self.current_delay;

        let grown = delay.as_secs_f64() * self.multiplier;
        self.current_delay = Duration::try_from_secs_f64(grown)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        delay
    }

    /// Starts over from the initial delay.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current_delay = self.initial_delay.min(self.max_delay);
    }

    /// Number of delays handed out since the last reset.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

/// Throttle applied to snapshot fetches after failed bridge attempts.
///
/// Disabled by default: a failed or stale snapshot is retried on the very
/// next diff.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResyncBackoffConfig {
    /// Whether throttling is enabled.
    pub enabled: bool,
    /// Wait after the first failed attempt.
    pub initial_delay: Duration,
    /// Longest wait between attempts.
    pub max_delay: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
}

impl Default for ResyncBackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

/// Tracks when the next snapshot fetch is allowed.
#[derive(Debug, Clone)]
pub struct ResyncThrottle {
    enabled: bool,
    backoff: Backoff,
    not_before: Option<Instant>,
}

impl ResyncThrottle {
    /// Creates a throttle from configuration.
    #[must_use]
    pub fn new(config: &ResyncBackoffConfig) -> Self {
        Self {
            enabled: config.enabled,
            backoff: Backoff::new(config.initial_delay, config.max_delay, config.multiplier),
            not_before: None,
        }
    }

    /// Returns true if a fetch may be issued at `now`.
    #[must_use]
    pub fn permits(&self, now: Instant) -> bool {
        match self.not_before {
            Some(deadline) => now >= deadline,
            None => true,
        }
    }

    /// Records a failed bridge attempt made at `now`.
    pub fn on_failure(&mut self, now: Instant) {
        if self.enabled {
            let delay = self.backoff.next_delay().min(MAX_RESYNC_DELAY);
            self.not_before = Some(now.checked_add(delay).unwrap_or(now));
        }
    }

    /// Records a successful bridge.
    pub fn on_success(&mut self) {
        self.backoff.reset();
        self.not_before = None;
    }

    /// Consecutive failures since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> usize {
        self.backoff.attempts()
    }
}
