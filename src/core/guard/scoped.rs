/*!
 * Scoped Guard
 *
 * Holds an acquired primitive and releases it on drop
 */

use super::traits::{Acquire, Guard};
use super::GuardMetadata;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::sync::Cx;
use tracing::{debug, warn};

/// Acquire `primitive` and wrap it in a guard
pub async fn scoped<'a, P: Acquire>(primitive: &'a P, cx: &Cx) -> SyncResult<ScopedGuard<'a, P>> {
    ScopedGuard::acquire(primitive, cx).await
}

/// Acquisition held for the guard's lifetime
///
/// Nothing is held if the acquire fails or is cancelled.
#[derive(Debug)]
pub struct ScopedGuard<'a, P: Acquire> {
    primitive: &'a P,
    metadata: GuardMetadata,
    active: bool,
}

impl<'a, P: Acquire> ScopedGuard<'a, P> {
    pub async fn acquire(primitive: &'a P, cx: &Cx) -> SyncResult<Self> {
        primitive.acquire(cx).await?;
        Ok(Self {
            primitive,
            metadata: GuardMetadata::new(P::RESOURCE),
            active: true,
        })
    }

    /// The guarded primitive
    #[inline]
    pub fn primitive(&self) -> &'a P {
        self.primitive
    }
}

impl<P: Acquire> Guard for ScopedGuard<'_, P> {
    fn resource_type(&self) -> &'static str {
        P::RESOURCE
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> SyncResult<()> {
        if !self.active {
            return Err(SyncError::LockState(format!("{} guard", P::RESOURCE)));
        }
        self.active = false;
        self.primitive.release()
    }
}

impl<P: Acquire> Drop for ScopedGuard<'_, P> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        match self.primitive.release() {
            Ok(()) => debug!(
                resource = P::RESOURCE,
                held_micros = self.metadata.lifetime_micros(),
                "Scoped guard released"
            ),
            Err(e) => warn!(resource = P::RESOURCE, error = %e, "Scoped guard release failed"),
        }
    }
}
