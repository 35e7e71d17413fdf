//! # depthsync Channel
//!
//! Bounded queues connecting feed threads, sync engines and downstream
//! consumers.
//!
//! This crate provides:
//! - [`spsc`] - Lock-free single-producer single-consumer ring buffer, one per
//!   (exchange, pair) diff feed
//! - [`mpsc`] - Bounded multi-producer single-consumer channel for fanning
//!   several engines into one consumer
//!
//! Both report a full queue separately from a disconnected peer, so callers can
//! choose between retrying and giving up.

pub mod mpsc;
pub mod spsc;

pub use mpsc::{MpscChannel, MpscReceiver, MpscSender};
pub use spsc::{SpscChannel, SpscReceiver, SpscSender};

use thiserror::Error;

/// Error returned by a failed send. The rejected item is handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError<T> {
    /// Channel is full, item returned.
    Full(T),
    /// Receiver is gone, item returned.
    Disconnected(T),
}

impl<T> std::fmt::Display for ChannelError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(_) => write!(f, "channel full"),
            Self::Disconnected(_) => write!(f, "channel disconnected"),
        }
    }
}

impl<T: std::fmt::Debug> std::error::Error for ChannelError<T> {}

impl<T> ChannelError<T> {
    /// Recovers the item that could not be sent.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Disconnected(item) => item,
        }
    }

    /// Returns true if the failure was a full queue.
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

/// Error returned by a failed non-blocking receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryRecvError {
    /// Nothing queued right now.
    #[error("channel empty")]
    Empty,
    /// Nothing queued and every sender is gone.
    #[error("channel disconnected")]
    Disconnected,
}
