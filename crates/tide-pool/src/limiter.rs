//! CapacityLimiter — counts alive workers against the pool ceiling.
//!
//! Every change is a compare-and-swap on one atomic counter: a slot is
//! reserved only while the count is below the ceiling, and retired early
//! only while the count is above the floor. A reserved [`Slot`] releases
//! itself on drop, so a worker task cannot leak its place.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

pub struct CapacityLimiter {
    alive: AtomicUsize,
    max: usize,
    /// Woken whenever the count drops to zero.
    drained: Notify,
}

impl CapacityLimiter {
    pub fn new(max: usize) -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicUsize::new(0),
            max,
            drained: Notify::new(),
        })
    }

    /// Reserve a slot if the ceiling allows it.
    pub fn try_reserve(self: &Arc<Self>) -> Option<Slot> {
        self.alive
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |alive| {
                (alive < self.max).then_some(alive + 1)
            })
            .ok()
            .map(|_| Slot {
                limiter: self.clone(),
                retired: false,
            })
    }

    pub fn alive(&self) -> usize {
        self.alive.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Resolve once no slot is held.
    pub async fn wait_drained(&self) {
        loop {
            let mut notified = pin!(self.drained.notified());
            notified.as_mut().enable();
            if self.alive() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn decremented(&self, previous: usize) {
        if previous == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// One alive worker's place in the pool.
pub struct Slot {
    limiter: Arc<CapacityLimiter>,
    retired: bool,
}

impl Slot {
    /// Give the slot back early, but only if that leaves at least `floor`
    /// workers alive. Returns whether the slot was retired.
    pub fn try_retire(&mut self, floor: usize) -> bool {
        if self.retired {
            return true;
        }
        let retired = self
            .limiter
            .alive
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |alive| {
                (alive > floor).then(|| alive - 1)
            });
        match retired {
            Ok(previous) => {
                self.retired = true;
                self.limiter.decremented(previous);
                true
            }
            Err(_) => false,
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if !self.retired {
            let previous = self.limiter.alive.fetch_sub(1, Ordering::AcqRel);
            self.limiter.decremented(previous);
        }
    }
}
