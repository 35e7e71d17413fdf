//! Bounded MPSC (Multi-Producer Single-Consumer) channel.
//!
//! Used when several engines publish into one downstream consumer, such as a
//! cross-exchange strategy watching many books at once.

use crate::{ChannelError, TryRecvError};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::time::Duration;

/// Creates a new bounded MPSC channel pair.
#[must_use]
pub fn channel<T: Send>(capacity: usize) -> (MpscSender<T>, MpscReceiver<T>) {
    MpscChannel::bounded(capacity)
}

/// MPSC channel factory.
pub struct MpscChannel;

impl MpscChannel {
    /// Creates a new bounded MPSC channel pair.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of items the channel can hold
    #[must_use]
    pub fn bounded<T: Send>(capacity: usize) -> (MpscSender<T>, MpscReceiver<T>) {
        let (sender, receiver) = bounded(capacity);
        (
            MpscSender { inner: sender },
            MpscReceiver { inner: receiver },
        )
    }
}

/// Sender half of an MPSC channel. Clone it to add producers.
#[derive(Clone)]
pub struct MpscSender<T> {
    inner: Sender<T>,
}

impl<T> MpscSender<T> {
    /// Non-blocking send attempt.
    ///
    /// # Errors
    /// Returns the item if the channel is full or disconnected.
    #[inline]
    pub fn try_send(&self, item: T) -> Result<(), ChannelError<T>> {
        self.inner.try_send(item).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(v) => ChannelError::Full(v),
            crossbeam_channel::TrySendError::Disconnected(v) => ChannelError::Disconnected(v),
        })
    }

    /// Send, waiting at most `timeout` for a free slot.
    ///
    /// # Errors
    /// Returns the item if the wait times out (as `Full`) or the receiver is gone.
    pub fn send_timeout(&self, item: T, timeout: Duration) -> Result<(), ChannelError<T>> {
        self.inner.send_timeout(item, timeout).map_err(|e| match e {
            crossbeam_channel::SendTimeoutError::Timeout(v) => ChannelError::Full(v),
            crossbeam_channel::SendTimeoutError::Disconnected(v) => ChannelError::Disconnected(v),
        })
    }

    /// Returns the number of items currently in the channel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the channel is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns true if the channel is full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    /// Returns the capacity of the channel.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity()
    }
}

/// Receiver half of an MPSC channel.
pub struct MpscReceiver<T> {
    inner: Receiver<T>,
}

impl<T> MpscReceiver<T> {
    /// Non-blocking receive.
    ///
    /// # Errors
    /// [`TryRecvError::Empty`] or, once every sender is dropped and the queue
    /// is drained, [`TryRecvError::Disconnected`].
    #[inline]
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.inner.try_recv().map_err(|e| match e {
            crossbeam_channel::TryRecvError::Empty => TryRecvError::Empty,
            crossbeam_channel::TryRecvError::Disconnected => TryRecvError::Disconnected,
        })
    }

    /// Blocking receive. `None` once every sender is gone.
    pub fn recv(&self) -> Option<T> {
        self.inner.recv().ok()
    }

    /// Receive with timeout.
    ///
    /// # Returns
    /// `Some(item)` if received within timeout, `None` otherwise.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.inner.recv_timeout(timeout).ok()
    }

    /// Drains all available items from the channel.
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(|| self.inner.try_recv().ok())
    }

    /// Returns the number of items currently in the channel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the channel is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
