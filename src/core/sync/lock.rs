/*!
 * Lock
 *
 * Cooperative mutual-exclusion lock. Not owner-tracked: any task may
 * release a held lock, matching the usual event-loop lock contract.
 */

use super::cancel::Cx;
use super::signal::Signal;
use super::waiters::WaiterQueue;
use crate::core::errors::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, Default)]
struct LockState {
    locked: bool,
    waiters: WaiterQueue,
}

/// Mutual-exclusion lock with FIFO hand-off
#[derive(Default)]
pub struct Lock {
    state: Mutex<LockState>,
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let held = if state.locked { "locked" } else { "unlocked" };
        if state.waiters.is_empty() {
            write!(f, "Lock [{}]", held)
        } else {
            write!(f, "Lock [{}, waiters:{}]", held, state.waiters.len())
        }
    }
}

impl Lock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the lock is currently held
    #[inline]
    pub fn locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Number of queued waiters, settled or not (for diagnostics)
    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Take the lock without suspending
    ///
    /// Fails if held or if any live waiter is queued ahead of us.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if !state.locked && !state.waiters.has_live() {
            state.locked = true;
            true
        } else {
            false
        }
    }

    /// Acquire the lock, suspending while it is held
    ///
    /// # Cancellation
    ///
    /// If cancelled while queued and the lock is free, the next live
    /// waiter is woken so the queue cannot stall on a wakeup addressed
    /// to this task.
    pub async fn acquire(&self, cx: &Cx) -> SyncResult<()> {
        let signal = {
            let mut state = self.state.lock();
            if !state.locked && !state.waiters.has_live() {
                state.locked = true;
                return Ok(());
            }
            state.waiters.push()
        };

        let mut entry = QueuedAcquire {
            lock: self,
            signal,
            armed: true,
        };

        let outcome = cx.suspend(&entry.signal).await;
        match outcome {
            Ok(()) => {
                let mut state = self.state.lock();
                state.waiters.remove(&entry.signal);
                state.locked = true;
                entry.armed = false;
                Ok(())
            }
            Err(_) => Err(SyncError::Cancelled),
        }
    }

    /// Release the lock and hand it to the first queued waiter
    pub fn release(&self) -> SyncResult<()> {
        let mut state = self.state.lock();
        if !state.locked {
            return Err(SyncError::LockState("Lock".to_string()));
        }
        state.locked = false;
        state.waiters.wake_first();
        Ok(())
    }
}

/// Cleanup for an acquire that leaves the queue without the lock,
/// whether through cancellation or by being dropped.
struct QueuedAcquire<'a> {
    lock: &'a Lock,
    signal: Signal,
    armed: bool,
}

impl Drop for QueuedAcquire<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.signal.cancel();
        let mut state = self.lock.state.lock();
        state.waiters.remove(&self.signal);
        if !state.locked {
            state.waiters.wake_first();
        }
    }
}
