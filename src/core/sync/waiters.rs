/*!
 * Waiter Queue
 *
 * FIFO sequence of completion signals for tasks blocked on a primitive.
 * Insertion order is arrival order; entries leave on resolution or when
 * their owner gives up.
 */

use super::signal::Signal;
use std::collections::VecDeque;

/// Ordered queue of parked tasks
#[derive(Debug, Default)]
pub struct WaiterQueue {
    waiters: VecDeque<Signal>,
}

impl WaiterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a fresh signal at the tail and return a handle to it
    pub fn push(&mut self) -> Signal {
        let signal = Signal::new();
        self.waiters.push_back(signal.clone());
        signal
    }

    /// Remove a specific signal, wherever it sits
    pub fn remove(&mut self, signal: &Signal) -> bool {
        match self.waiters.iter().position(|w| w.same(signal)) {
            Some(idx) => {
                self.waiters.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Whether any queued signal has not been cancelled
    pub fn has_live(&self) -> bool {
        self.waiters.iter().any(|w| !w.is_cancelled())
    }

    /// Resolve the head signal unless it is already settled
    ///
    /// A settled head belongs to a task that will wake on its own and
    /// either take the resource or pass the wakeup on.
    pub fn wake_first(&self) -> bool {
        match self.waiters.front() {
            Some(head) => head.resolve(()),
            None => false,
        }
    }

    /// Pop signals from the head until one is resolved
    pub fn wake_next(&mut self) -> bool {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.resolve(()) {
                return true;
            }
        }
        false
    }

    /// Resolve up to `n` unsettled signals in arrival order
    pub fn wake(&self, n: usize) -> usize {
        let mut woken = 0;
        for waiter in &self.waiters {
            if woken >= n {
                break;
            }
            if waiter.resolve(()) {
                woken += 1;
            }
        }
        woken
    }

    /// Resolve every unsettled signal
    pub fn wake_all(&self) -> usize {
        self.wake(self.waiters.len())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
