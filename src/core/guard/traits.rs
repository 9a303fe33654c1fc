/*!
 * Guard Traits
 *
 * Core abstractions for scoped acquisition
 */

use super::GuardMetadata;
use crate::core::errors::SyncResult;
use crate::core::sync::{BoundedSemaphore, Condition, Cx, Lock, Semaphore};
use std::future::Future;

/// Core guard trait
///
/// All guards provide:
/// - Resource type identification
/// - Metadata access
/// - Manual release capability
pub trait Guard: Send {
    /// Resource type name for logging/debugging
    fn resource_type(&self) -> &'static str;

    /// Get guard metadata
    fn metadata(&self) -> &GuardMetadata;

    /// Check if guard still holds its resource
    fn is_active(&self) -> bool;

    /// Manually release the resource
    ///
    /// Returns `Err` if already released or if the primitive rejects it
    fn release(&mut self) -> SyncResult<()>;
}

/// Primitives with an acquire/release shape
pub trait Acquire: Send + Sync {
    /// Name used in guard diagnostics
    const RESOURCE: &'static str;

    /// Suspend until acquired or cancelled
    fn acquire<'a>(&'a self, cx: &'a Cx) -> impl Future<Output = SyncResult<()>> + Send + 'a;

    /// Give back what `acquire` took
    fn release(&self) -> SyncResult<()>;
}

impl Acquire for Lock {
    const RESOURCE: &'static str = "lock";

    fn acquire<'a>(&'a self, cx: &'a Cx) -> impl Future<Output = SyncResult<()>> + Send + 'a {
        Lock::acquire(self, cx)
    }

    fn release(&self) -> SyncResult<()> {
        Lock::release(self)
    }
}

impl Acquire for Condition {
    const RESOURCE: &'static str = "condition";

    fn acquire<'a>(&'a self, cx: &'a Cx) -> impl Future<Output = SyncResult<()>> + Send + 'a {
        Condition::acquire(self, cx)
    }

    fn release(&self) -> SyncResult<()> {
        Condition::release(self)
    }
}

impl Acquire for Semaphore {
    const RESOURCE: &'static str = "semaphore";

    fn acquire<'a>(&'a self, cx: &'a Cx) -> impl Future<Output = SyncResult<()>> + Send + 'a {
        Semaphore::acquire(self, cx)
    }

    fn release(&self) -> SyncResult<()> {
        Semaphore::release(self);
        Ok(())
    }
}

impl Acquire for BoundedSemaphore {
    const RESOURCE: &'static str = "bounded_semaphore";

    fn acquire<'a>(&'a self, cx: &'a Cx) -> impl Future<Output = SyncResult<()>> + Send + 'a {
        BoundedSemaphore::acquire(self, cx)
    }

    fn release(&self) -> SyncResult<()> {
        BoundedSemaphore::release(self)
    }
}
