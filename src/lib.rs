/*!
 * Coop Sync Library
 * Cooperative synchronization primitives and buffered byte streams
 */

pub mod core;
pub mod monitoring;
pub mod stream;

// Re-exports
pub use crate::core::errors::*;
pub use crate::core::guard::{scoped, Acquire, Guard, ScopedGuard};
pub use crate::core::sync::{
    Barrier, BarrierState, BoundedSemaphore, Condition, Cx, Event, Lock, Semaphore,
};
pub use monitoring::{init_tracing, span_operation};
pub use stream::{
    duplex, Closing, Stream, StreamBuilder, StreamConfig, StreamMode, StreamProtocol, Transport,
    WriteCompletion,
};
