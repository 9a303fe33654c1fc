/*!
 * Core Module
 * Synchronization primitives, guards, limits, and error handling
 */

pub mod errors;
pub mod guard;
pub mod limits;
pub mod serde;
pub mod sync;

// Re-export for convenience
pub use errors::*;
pub use guard::{scoped, Acquire, Guard, GuardMetadata, ScopedGuard};
pub use sync::{
    Barrier, BarrierAction, BarrierState, BoundedSemaphore, Condition, Cx, Event, Lock,
    Semaphore, Signal, SignalError, WaiterQueue,
};
