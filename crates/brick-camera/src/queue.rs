use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Single-slot hand-off between one producer and one consumer.
///
/// Pushing into a full slot replaces the queued item, so the consumer always
/// sees the newest one. Safe to share between threads without extra locking.
#[derive(Debug)]
pub struct FrameSlot<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Stores `item`, returning the older item it evicted, if any.
    pub fn try_push_evicting_oldest(&self, item: T) -> Option<T> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let evicted = slot.replace(item);
        drop(slot);
        self.ready.notify_one();
        evicted
    }

    /// Takes the queued item, waiting at most `timeout` for one to arrive.
    pub fn pop_with_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(item) = slot.take() {
                return Some(item);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            slot = self
                .ready
                .wait_timeout(slot, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Empties the slot, returning what was queued.
    pub fn drain(&self) -> Option<T> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub fn len(&self) -> usize {
        usize::from(self.slot.lock().unwrap_or_else(|e| e.into_inner()).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
