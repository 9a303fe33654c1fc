/*!
 * Task Cancellation Context
 *
 * Explicit per-task context passed to every suspending operation.
 *
 * A cancellation request is delivered exactly once, at the next point where
 * the task actually suspends, and surfaces there as an error. The task may
 * then suspend again normally, which is what lets a condition variable
 * re-acquire its lock after being cancelled.
 */

use super::signal::{Signal, SignalError};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Default)]
struct CxState {
    requested: bool,
    delivered: u64,
    waker: Option<Waker>,
}

/// Cancellation context for one logical task
///
/// Clones share the same state, so the scheduler side can keep a handle
/// and call [`Cx::cancel`] while the task holds another.
#[derive(Clone, Default)]
pub struct Cx {
    inner: Arc<Mutex<CxState>>,
}

impl fmt::Debug for Cx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Cx")
            .field("requested", &state.requested)
            .field("delivered", &state.delivered)
            .finish()
    }
}

impl Cx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the task's current or next suspension
    ///
    /// Returns `false` if a request is already pending.
    pub fn cancel(&self) -> bool {
        let waker = {
            let mut state = self.inner.lock();
            if state.requested {
                return false;
            }
            state.requested = true;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Whether a request is pending delivery
    #[inline]
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.lock().requested
    }

    /// Number of requests delivered so far
    #[inline]
    pub fn delivered(&self) -> u64 {
        self.inner.lock().delivered
    }

    /// Consume a pending request, if any
    pub(crate) fn take_cancel(&self) -> bool {
        let mut state = self.inner.lock();
        if state.requested {
            state.requested = false;
            state.delivered += 1;
            true
        } else {
            false
        }
    }

    fn register(&self, waker: &Waker) {
        let mut state = self.inner.lock();
        match &state.waker {
            Some(existing) if existing.will_wake(waker) => {}
            _ => state.waker = Some(waker.clone()),
        }
    }

    /// Suspend on `signal`, interruptible by this context
    ///
    /// A pending cancellation wins over an already settled signal; callers
    /// inspect the signal afterwards to learn whether a wakeup was consumed.
    pub fn suspend<'a, T, E>(&'a self, signal: &'a Signal<T, E>) -> Suspend<'a, T, E>
    where
        T: Clone,
        E: Clone,
    {
        Suspend { cx: self, signal }
    }
}

/// Future returned by [`Cx::suspend`]
#[must_use = "futures do nothing unless polled"]
pub struct Suspend<'a, T, E> {
    cx: &'a Cx,
    signal: &'a Signal<T, E>,
}

impl<T: Clone, E: Clone> Future for Suspend<'_, T, E> {
    type Output = Result<T, SignalError<E>>;

    fn poll(self: Pin<&mut Self>, task: &mut Context<'_>) -> Poll<Self::Output> {
        // Register before checking so a concurrent cancel() cannot slip in between.
        self.cx.register(task.waker());
        if self.cx.take_cancel() {
            return Poll::Ready(Err(SignalError::Cancelled));
        }
        self.signal.poll_outcome(task.waker())
    }
}
