/*!
 * Completion Signal
 *
 * Single-assignment result cell a task parks on until another task
 * resolves, fails, or cancels it.
 *
 * # Design
 *
 * A signal has three terminal states (resolved, failed, cancelled). The
 * first transition wins; later ones are rejected and reported as `false`.
 * Any number of tasks may poll the same signal, each registering its own
 * waker, so the terminal value must be `Clone`.
 */

use parking_lot::Mutex;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Why a signal did not produce a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError<E> {
    /// The producer failed the signal
    Failed(E),
    /// The signal, or the task waiting on it, was cancelled
    Cancelled,
}

enum State<T, E> {
    Pending,
    Resolved(T),
    Failed(E),
    Cancelled,
}

impl<T, E> State<T, E> {
    fn name(&self) -> &'static str {
        match self {
            State::Pending => "pending",
            State::Resolved(_) => "resolved",
            State::Failed(_) => "failed",
            State::Cancelled => "cancelled",
        }
    }
}

struct Cell<T, E> {
    state: State<T, E>,
    wakers: Vec<Waker>,
}

/// Single-assignment, cancellable completion signal
///
/// Cloning yields another handle to the same cell.
pub struct Signal<T = (), E = Infallible> {
    cell: Arc<Mutex<Cell<T, E>>>,
}

impl<T, E> Clone for Signal<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T, E> Default for Signal<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Signal<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.cell.lock();
        f.debug_struct("Signal")
            .field("state", &cell.state.name())
            .field("wakers", &cell.wakers.len())
            .finish()
    }
}

impl<T, E> Signal<T, E> {
    /// Create a pending signal
    pub fn new() -> Self {
        Self {
            cell: Arc::new(Mutex::new(Cell {
                state: State::Pending,
                wakers: Vec::new(),
            })),
        }
    }

    /// Resolve with a value. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(State::Resolved(value))
    }

    /// Fail with an error. Returns `false` if already settled.
    pub fn fail(&self, error: E) -> bool {
        self.settle(State::Failed(error))
    }

    /// Cancel the signal. Returns `false` if already settled.
    pub fn cancel(&self) -> bool {
        self.settle(State::Cancelled)
    }

    fn settle(&self, next: State<T, E>) -> bool {
        let wakers = {
            let mut cell = self.cell.lock();
            if !matches!(cell.state, State::Pending) {
                return false;
            }
            cell.state = next;
            std::mem::take(&mut cell.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// True once resolved, failed, or cancelled
    #[inline]
    pub fn is_done(&self) -> bool {
        !matches!(self.cell.lock().state, State::Pending)
    }

    /// True if resolved or failed (settled by the producer, not cancelled)
    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.cell.lock().state,
            State::Resolved(_) | State::Failed(_)
        )
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cell.lock().state, State::Cancelled)
    }

    /// Whether two handles refer to the same cell
    #[inline]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: Clone, E: Clone> Signal<T, E> {
    /// Non-blocking poll: the outcome if settled, `None` while pending
    pub fn try_outcome(&self) -> Option<Result<T, SignalError<E>>> {
        let cell = self.cell.lock();
        Self::outcome(&cell.state)
    }

    /// Poll for the outcome, registering `waker` while pending
    pub fn poll_outcome(&self, waker: &Waker) -> Poll<Result<T, SignalError<E>>> {
        let mut cell = self.cell.lock();
        match Self::outcome(&cell.state) {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                if !cell.wakers.iter().any(|w| w.will_wake(waker)) {
                    cell.wakers.push(waker.clone());
                }
                Poll::Pending
            }
        }
    }

    /// Suspend until the signal settles
    ///
    /// This accessor is not interruptible through a [`Cx`](super::Cx);
    /// use [`Cx::suspend`](super::Cx::suspend) for that.
    pub fn wait(&self) -> SignalWait<'_, T, E> {
        SignalWait { signal: self }
    }

    fn outcome(state: &State<T, E>) -> Option<Result<T, SignalError<E>>> {
        match state {
            State::Pending => None,
            State::Resolved(value) => Some(Ok(value.clone())),
            State::Failed(error) => Some(Err(SignalError::Failed(error.clone()))),
            State::Cancelled => Some(Err(SignalError::Cancelled)),
        }
    }
}

/// Future returned by [`Signal::wait`]
#[must_use = "futures do nothing unless polled"]
pub struct SignalWait<'a, T, E> {
    signal: &'a Signal<T, E>,
}

impl<T: Clone, E: Clone> Future for SignalWait<'_, T, E> {
    type Output = Result<T, SignalError<E>>;

    fn poll(self: Pin<&mut Self>, task: &mut Context<'_>) -> Poll<Self::Output> {
        self.signal.poll_outcome(task.waker())
    }
}
