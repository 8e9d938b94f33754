//! # Single-Slot Handoff
//!
//! Latest-value-wins exchange between exactly one producer and one consumer
//! on different threads. Publishing into an occupied slot evicts the older
//! value, so a slow consumer sees bounded latency instead of a growing queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use tracing::warn;

/// Both ends of a slot. Clone it to hand one copy to each thread.
#[derive(Debug)]
pub struct LatestSlot<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    dropped: Arc<AtomicU64>,
}

impl<T> Clone for LatestSlot<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publishes `value`, evicting whatever is still waiting in the slot.
    /// Returns `true` if an older value was dropped.
    pub fn publish(&self, value: T) -> bool {
        let mut value = value;
        let mut evicted = false;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(back)) => {
                    value = back;
                    if self.rx.try_recv().is_ok() {
                        evicted = true;
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        if total.is_power_of_two() {
                            warn!(total, "handoff slot overwritten; consumer is falling behind");
                        }
                    }
                }
                // Both ends live inside `self`, so the channel cannot disconnect.
                Err(TrySendError::Disconnected(_)) => return evicted,
            }
        }
    }

    /// Takes the current value, if any, without blocking.
    pub fn take(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for a value.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receiver side for use in `crossbeam_channel::select!`.
    pub fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }

    /// How many values were evicted before being consumed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
