/*!
 * Scoped Acquisition Guards
 *
 * RAII wrappers that acquire a primitive on construction and release it
 * on every exit path.
 *
 * ## Design Principles
 *
 * 1. **Generic**: One guard type for anything shaped like acquire/release
 * 2. **Observable**: Release failures and hold times go to `tracing`
 * 3. **Explicit**: `release()` is available when the caller wants the error
 *
 * ## Example
 *
 * ```ignore
 * let lock = Lock::new();
 * let cx = Cx::new();
 * {
 *     let _held = scoped(&lock, &cx).await?;
 *     // critical section
 * } // released here
 * ```
 */

mod scoped;
mod traits;

pub use scoped::{scoped, ScopedGuard};
pub use traits::{Acquire, Guard};

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
        }
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
