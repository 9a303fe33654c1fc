/*!
 * Semaphore
 *
 * Counting semaphore and its bounded variant.
 *
 * # Cancel Safety
 *
 * A release pops one waiter and resolves it. If that waiter is cancelled
 * before it runs, the wakeup is forwarded to the next waiter so the
 * release is not lost.
 */

use super::cancel::Cx;
use super::signal::Signal;
use super::waiters::WaiterQueue;
use crate::core::errors::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, Default)]
struct SemaphoreState {
    value: usize,
    waiters: WaiterQueue,
}

/// Counting semaphore
pub struct Semaphore {
    state: Mutex<SemaphoreState>,
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(1)
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let held = if state.value == 0 { "locked" } else { "unlocked" };
        write!(f, "Semaphore [{}, value:{}", held, state.value)?;
        if !state.waiters.is_empty() {
            write!(f, ", waiters:{}", state.waiters.len())?;
        }
        write!(f, "]")
    }
}

impl Semaphore {
    /// Create a semaphore holding `value` permits
    pub fn new(value: usize) -> Self {
        Self {
            state: Mutex::new(SemaphoreState {
                value,
                waiters: WaiterQueue::new(),
            }),
        }
    }

    /// Create from a signed seed, rejecting negative values
    pub fn try_new(seed: i64) -> SyncResult<Self> {
        let value = usize::try_from(seed).map_err(|_| {
            SyncError::InvalidArgument(format!(
                "Semaphore initial value must be >= 0, got {}",
                seed
            ))
        })?;
        Ok(Self::new(value))
    }

    /// True if an acquire would suspend
    #[inline]
    pub fn locked(&self) -> bool {
        self.state.lock().value == 0
    }

    /// Current permit count
    #[inline]
    pub fn value(&self) -> usize {
        self.state.lock().value
    }

    /// Take a permit without suspending
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.value > 0 {
            state.value -= 1;
            true
        } else {
            false
        }
    }

    /// Acquire a permit, suspending while none are available
    pub async fn acquire(&self, cx: &Cx) -> SyncResult<()> {
        loop {
            let signal = {
                let mut state = self.state.lock();
                if state.value > 0 {
                    state.value -= 1;
                    return Ok(());
                }
                state.waiters.push()
            };

            let mut entry = QueuedPermit {
                semaphore: self,
                signal,
                armed: true,
            };

            let outcome = cx.suspend(&entry.signal).await;
            if outcome.is_err() {
                return Err(SyncError::Cancelled);
            }
            // Woken by a release; re-check the count since a newcomer may
            // have taken the permit first.
            entry.armed = false;
        }
    }

    /// Return a permit and wake the first pending waiter
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.value += 1;
        state.waiters.wake_next();
    }

    fn release_within(&self, bound: usize) -> SyncResult<()> {
        let mut state = self.state.lock();
        if state.value >= bound {
            return Err(SyncError::BoundCapacity { bound });
        }
        state.value += 1;
        state.waiters.wake_next();
        Ok(())
    }
}

/// Cleanup for an acquire that gives up while queued
struct QueuedPermit<'a> {
    semaphore: &'a Semaphore,
    signal: Signal,
    armed: bool,
}

impl Drop for QueuedPermit<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // cancel() fails only if a release already resolved us.
        let woken = !self.signal.cancel();
        let mut state = self.semaphore.state.lock();
        state.waiters.remove(&self.signal);
        if woken && state.value > 0 {
            state.waiters.wake_next();
        }
    }
}

/// Semaphore that rejects releases beyond its initial value
pub struct BoundedSemaphore {
    semaphore: Semaphore,
    bound: usize,
}

impl Default for BoundedSemaphore {
    fn default() -> Self {
        Self::new(1)
    }
}

impl fmt::Debug for BoundedSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bounded{:?} (bound:{})", self.semaphore, self.bound)
    }
}

impl BoundedSemaphore {
    pub fn new(value: usize) -> Self {
        Self {
            semaphore: Semaphore::new(value),
            bound: value,
        }
    }

    pub fn try_new(seed: i64) -> SyncResult<Self> {
        let semaphore = Semaphore::try_new(seed)?;
        let bound = semaphore.value();
        Ok(Self { semaphore, bound })
    }

    #[inline]
    pub fn bound(&self) -> usize {
        self.bound
    }

    #[inline]
    pub fn locked(&self) -> bool {
        self.semaphore.locked()
    }

    #[inline]
    pub fn value(&self) -> usize {
        self.semaphore.value()
    }

    pub fn try_acquire(&self) -> bool {
        self.semaphore.try_acquire()
    }

    pub async fn acquire(&self, cx: &Cx) -> SyncResult<()> {
        self.semaphore.acquire(cx).await
    }

    /// Return a permit; fails if every permit is already returned
    pub fn release(&self) -> SyncResult<()> {
        self.semaphore.release_within(self.bound)
    }
}
