/*!
 * System Limits and Constants
 *
 * Centralized location for stream pacing thresholds and transport
 * water marks. Organized by domain for discoverability.
 */

// =============================================================================
// STREAM LIMITS
// =============================================================================

/// Default stream limit (64KB)
/// Maximum line / chunk length for read_until(), and half the read
/// buffer size at which the transport is asked to pause
pub const DEFAULT_STREAM_LIMIT: usize = 64 * 1024;

/// Read buffer pause factor
/// Reading pauses once the buffer holds more than `limit * PAUSE_FACTOR`
/// bytes and resumes once it drains to `limit` or less
pub const PAUSE_FACTOR: usize = 2;

/// Chunk size for the sendfile read-and-write fallback (256KB)
pub const SENDFILE_FALLBACK_CHUNK: usize = 256 * 1024;

/// Default line separator
pub const DEFAULT_SEPARATOR: &[u8] = b"\n";

// =============================================================================
// MEMORY TRANSPORT
// =============================================================================

/// Write buffer high-water mark (64KB)
/// The writer is paused once more than this many bytes are queued
/// toward a peer whose reading is paused
pub const DEFAULT_HIGH_WATER: usize = 64 * 1024;

/// Write buffer low-water mark (16KB)
/// The writer is resumed once the queue drains to this many bytes
pub const DEFAULT_LOW_WATER: usize = DEFAULT_HIGH_WATER / 4;
