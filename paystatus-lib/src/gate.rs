//! Delivery gate shared by the channel and the publisher.
//!
//! Callbacks run while the gate's re-entrant lock is held and only when the
//! caller's epoch is still current. Closing swaps the epoch under the same
//! lock, so once `close` returns no callback can start. Re-entrancy lets a
//! callback close its own owner.

use parking_lot::ReentrantMutex;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Epoch value meaning "closed".
const CLOSED: u64 = 0;

pub(crate) struct DeliveryGate {
    current: ReentrantMutex<Cell<u64>>,
    next: AtomicU64,
}

impl DeliveryGate {
    pub(crate) fn new() -> Self {
        Self {
            current: ReentrantMutex::new(Cell::new(CLOSED)),
            next: AtomicU64::new(CLOSED),
        }
    }

    /// Start a new epoch, invalidating the previous one.
    pub(crate) fn open(&self) -> u64 {
        let epoch = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.current.lock().set(epoch);
        epoch
    }

    /// Invalidate the current epoch. Waits for an in-flight callback on
    /// another thread to finish.
    pub(crate) fn close(&self) {
        self.current.lock().set(CLOSED);
    }

    /// Run `f` while holding the gate, so no callback runs concurrently.
    ///
    /// Locks taken inside `f` are ordered after the gate, matching callbacks.
    pub(crate) fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _held = self.current.lock();
        f()
    }

    /// Run `f` if `epoch` is still current. Returns whether it ran.
    pub(crate) fn deliver(&self, epoch: u64, f: impl FnOnce()) -> bool {
        let current = self.current.lock();
        if epoch == CLOSED || current.get() != epoch {
            return false;
        }
        f();
        true
    }
}
