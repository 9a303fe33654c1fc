/*!
 * Event
 *
 * Broadcast flag: tasks wait until it is set; setting it wakes all of them.
 */

use super::cancel::Cx;
use super::signal::Signal;
use super::waiters::WaiterQueue;
use crate::core::errors::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, Default)]
struct EventState {
    set: bool,
    waiters: WaiterQueue,
}

/// Event flag with broadcast wakeup
#[derive(Default)]
pub struct Event {
    state: Mutex<EventState>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let flag = if state.set { "set" } else { "unset" };
        if state.waiters.is_empty() {
            write!(f, "Event [{}]", flag)
        } else {
            write!(f, "Event [{}, waiters:{}]", flag, state.waiters.len())
        }
    }
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.state.lock().set
    }

    /// Set the flag, waking every waiter if it was clear
    pub fn set(&self) {
        let mut state = self.state.lock();
        if !state.set {
            state.set = true;
            state.waiters.wake_all();
        }
    }

    /// Clear the flag; already woken waiters are unaffected
    pub fn clear(&self) {
        self.state.lock().set = false;
    }

    /// Wait until the flag is set. Always returns `true` on success.
    pub async fn wait(&self, cx: &Cx) -> SyncResult<bool> {
        let signal = {
            let mut state = self.state.lock();
            if state.set {
                return Ok(true);
            }
            state.waiters.push()
        };

        let _entry = QueuedWait {
            event: self,
            signal: signal.clone(),
        };

        let outcome = cx.suspend(&signal).await;
        match outcome {
            Ok(()) => Ok(true),
            Err(_) => Err(SyncError::Cancelled),
        }
    }
}

/// Removes the waiter's signal on every exit path
struct QueuedWait<'a> {
    event: &'a Event,
    signal: Signal,
}

impl Drop for QueuedWait<'_> {
    fn drop(&mut self) {
        self.signal.cancel();
        self.event.state.lock().waiters.remove(&self.signal);
    }
}
