/*!
 * Synchronization Primitives
 *
 * Cooperative primitives for tasks that interleave only at suspension
 * points:
 * - [`Lock`] for mutual exclusion with FIFO hand-off
 * - [`Event`] for broadcast wakeup
 * - [`Condition`] for wait/notify under a lock
 * - [`Semaphore`] and [`BoundedSemaphore`] for counted access
 * - [`Barrier`] for cyclic rendezvous
 *
 * # Architecture
 *
 * Every primitive is a small state machine over a [`WaiterQueue`] of
 * [`Signal`]s. A blocked task parks on its own signal through
 * [`Cx::suspend`], which also delivers cancellation.
 *
 * # Cancel Safety
 *
 * Cancellation arrives either through [`Cx::cancel`] or by dropping the
 * future. Both paths run the same cleanup, so a wakeup handed to a task
 * that gives up is passed on rather than lost.
 */

mod barrier;
mod cancel;
mod condition;
mod event;
mod lock;
mod semaphore;
mod signal;
mod waiters;

pub use barrier::{Barrier, BarrierAction, BarrierState};
pub use cancel::{Cx, Suspend};
pub use condition::Condition;
pub use event::Event;
pub use lock::Lock;
pub use semaphore::{BoundedSemaphore, Semaphore};
pub use signal::{Signal, SignalError, SignalWait};
pub use waiters::WaiterQueue;
