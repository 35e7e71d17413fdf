//! Lock-free SPSC (Single-Producer Single-Consumer) channel.
//!
//! Each sync engine is the only consumer of its diff feed and the only
//! producer of its book events, so a wait-free ring buffer is enough on both
//! ends. Dropping either half marks the channel closed for the other.

use crate::{ChannelError, TryRecvError};
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Creates a new SPSC channel pair with the given capacity.
#[must_use]
pub fn channel<T>(capacity: usize) -> (SpscSender<T>, SpscReceiver<T>) {
    SpscChannel::new(capacity)
}

/// SPSC channel factory.
pub struct SpscChannel;

impl SpscChannel {
    /// Creates a new SPSC channel pair.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of items the channel can hold
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub fn new<T>(capacity: usize) -> (SpscSender<T>, SpscReceiver<T>) {
        let (producer, consumer) = RingBuffer::new(capacity);
        let closed = Arc::new(AtomicBool::new(false));

        (
            SpscSender {
                producer,
                closed: Arc::clone(&closed),
            },
            SpscReceiver { consumer, closed },
        )
    }
}

/// Sender half of an SPSC channel.
pub struct SpscSender<T> {
    producer: Producer<T>,
    closed: Arc<AtomicBool>,
}

impl<T> SpscSender<T> {
    /// Pushes an item without blocking.
    ///
    /// # Errors
    /// Returns the item as [`ChannelError::Full`] when the ring is full, or as
    /// [`ChannelError::Disconnected`] once the receiver has been dropped.
    #[inline]
    pub fn try_send(&mut self, item: T) -> Result<(), ChannelError<T>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Disconnected(item));
        }
        self.producer.push(item).map_err(|e| match e {
            rtrb::PushError::Full(item) => ChannelError::Full(item),
        })
    }

    /// Checks if the receiver is still connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Returns the number of items waiting in the channel.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.capacity() - self.producer.slots()
    }

    /// Returns true if the channel is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if no slot is free.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }

    /// Returns the capacity of the channel.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }
}

impl<T> Drop for SpscSender<T> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Receiver half of an SPSC channel.
pub struct SpscReceiver<T> {
    consumer: Consumer<T>,
    closed: Arc<AtomicBool>,
}

impl<T> SpscReceiver<T> {
    /// Pops an item without blocking.
    ///
    /// # Errors
    /// [`TryRecvError::Empty`] if nothing is queued, [`TryRecvError::Disconnected`]
    /// if nothing is queued and the sender is gone.
    #[inline]
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        if let Ok(item) = self.consumer.pop() {
            return Ok(item);
        }
        if self.closed.load(Ordering::Acquire) {
            // The sender may have pushed right before closing.
            return self.consumer.pop().map_err(|_| TryRecvError::Disconnected);
        }
        Err(TryRecvError::Empty)
    }

    /// Pops an item if one is queued.
    #[inline]
    pub fn recv(&mut self) -> Option<T> {
        self.consumer.pop().ok()
    }

    /// Spins up to `spin_count` times waiting for an item.
    ///
    /// # Errors
    /// Same as [`Self::try_recv`], after the spin budget is exhausted.
    #[inline]
    pub fn recv_spin_limited(&mut self, spin_count: usize) -> Result<T, TryRecvError> {
        for _ in 0..spin_count {
            if let Ok(item) = self.consumer.pop() {
                return Ok(item);
            }
            std::hint::spin_loop();
        }
        self.try_recv()
    }

    /// Drains all currently queued items.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(|| self.consumer.pop().ok())
    }

    /// Checks if the sender is still connected or items remain.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) || !self.is_empty()
    }

    /// Returns the number of items currently in the channel.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    /// Returns true if the channel is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

impl<T> Drop for SpscReceiver<T> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}
