/*!
 * Condition
 *
 * Condition variable bound to a [`Lock`]. The waiter queue is separate
 * from the lock's own queue.
 */

use super::cancel::Cx;
use super::lock::Lock;
use super::signal::Signal;
use super::waiters::WaiterQueue;
use crate::core::errors::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Condition variable
pub struct Condition {
    lock: Arc<Lock>,
    waiters: Mutex<WaiterQueue>,
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held = if self.lock.locked() { "locked" } else { "unlocked" };
        let waiting = self.waiters.lock().len();
        if waiting == 0 {
            write!(f, "Condition [{}]", held)
        } else {
            write!(f, "Condition [{}, waiters:{}]", held, waiting)
        }
    }
}

impl Condition {
    /// Create a condition with its own lock
    pub fn new() -> Self {
        Self::with_lock(Arc::new(Lock::new()))
    }

    /// Create a condition over an existing lock
    pub fn with_lock(lock: Arc<Lock>) -> Self {
        Self {
            lock,
            waiters: Mutex::new(WaiterQueue::new()),
        }
    }

    /// The underlying lock
    #[inline]
    pub fn lock(&self) -> &Arc<Lock> {
        &self.lock
    }

    #[inline]
    pub fn locked(&self) -> bool {
        self.lock.locked()
    }

    pub async fn acquire(&self, cx: &Cx) -> SyncResult<()> {
        self.lock.acquire(cx).await
    }

    pub fn release(&self) -> SyncResult<()> {
        self.lock.release()
    }

    /// Wait until notified
    ///
    /// Releases the lock, parks, and re-acquires the lock before returning,
    /// including when cancelled. Cancellations that land during the
    /// re-acquire are absorbed and retried; any cancellation observed is
    /// reported once the lock is held again.
    ///
    /// Dropping the returned future mid-wait leaves the lock released.
    pub async fn wait(&self, cx: &Cx) -> SyncResult<bool> {
        if !self.lock.locked() {
            return Err(SyncError::LockState("Condition lock".to_string()));
        }
        self.lock.release()?;

        let signal = self.waiters.lock().push();
        let outcome = {
            let _entry = QueuedNotify {
                condition: self,
                signal: signal.clone(),
            };
            cx.suspend(&signal).await
        };

        let mut cancelled = outcome.is_err();
        loop {
            match self.lock.acquire(cx).await {
                Ok(()) => break,
                Err(SyncError::Cancelled) => cancelled = true,
                Err(other) => return Err(other),
            }
        }

        if cancelled {
            Err(SyncError::Cancelled)
        } else {
            Ok(true)
        }
    }

    /// Wait until `predicate` holds, returning its final value
    pub async fn wait_for<F>(&self, cx: &Cx, mut predicate: F) -> SyncResult<bool>
    where
        F: FnMut() -> bool,
    {
        let mut result = predicate();
        while !result {
            self.wait(cx).await?;
            result = predicate();
        }
        Ok(result)
    }

    /// Wake up to `n` waiters in arrival order. Returns how many were woken.
    ///
    /// Does not release the lock; woken tasks resume once the caller does.
    pub fn notify(&self, n: usize) -> SyncResult<usize> {
        if !self.lock.locked() {
            return Err(SyncError::LockState("Condition lock".to_string()));
        }
        Ok(self.waiters.lock().wake(n))
    }

    /// Wake every waiter
    pub fn notify_all(&self) -> SyncResult<usize> {
        let n = self.waiters.lock().len();
        self.notify(n)
    }

    /// Number of queued waiters (for diagnostics)
    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

struct QueuedNotify<'a> {
    condition: &'a Condition,
    signal: Signal,
}

impl Drop for QueuedNotify<'_> {
    fn drop(&mut self) {
        self.signal.cancel();
        self.condition.waiters.lock().remove(&self.signal);
    }
}
