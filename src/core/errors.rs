/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::stream::StreamMode;
use bytes::Bytes;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Result type for synchronization primitives
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Synchronization primitive errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("{0} is not acquired")]
    #[diagnostic(
        code(sync::lock_state),
        help("Only the task holding the lock may release it, wait on it, or notify through it.")
    )]
    LockState(String),

    #[error("Barrier is broken or being reset")]
    #[diagnostic(
        code(sync::broken_barrier),
        help("The barrier was aborted or reset while this task was inside it.")
    )]
    BrokenBarrier,

    #[error("BoundedSemaphore released too many times (bound: {bound})")]
    #[diagnostic(
        code(sync::bound_capacity),
        help("Every release must pair with a prior acquire.")
    )]
    BoundCapacity { bound: usize },

    #[error("Operation cancelled")]
    #[diagnostic(code(sync::cancelled))]
    Cancelled,

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(sync::invalid_argument))]
    InvalidArgument(String),

    #[error("Barrier action failed: {0}")]
    #[diagnostic(
        code(sync::action_failed),
        help("The barrier has been aborted; reset() it before reuse.")
    )]
    ActionFailed(String),
}

impl SyncError {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

/// Which way a separator scan overran the stream limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// Separator not found and the scanned region exceeds the limit
    NotFound,
    /// Separator found, but the chunk before it is longer than the limit
    FoundBeyondLimit,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitKind::NotFound => write!(f, "Separator is not found, and chunk exceed the limit"),
            LimitKind::FoundBeyondLimit => {
                write!(f, "Separator is found, but chunk is longer than limit")
            }
        }
    }
}

/// Stream errors
///
/// Cloneable so a stored exception can be surfaced to every later reader.
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum StreamError {
    #[error("{kind} (consumed: {consumed})")]
    #[diagnostic(
        code(stream::limit_exceeded),
        help("The data is still buffered; raise the stream limit or consume it with read().")
    )]
    LimitExceeded { kind: LimitKind, consumed: usize },

    #[error(
        "{} bytes read on a total of {} expected bytes",
        partial.len(),
        expected_label(expected)
    )]
    #[diagnostic(code(stream::incomplete_read))]
    IncompleteRead {
        partial: Bytes,
        expected: Option<usize>,
    },

    #[error("Connection lost")]
    #[diagnostic(code(stream::connection_reset))]
    ConnectionReset,

    #[error("{operation}() called while another task is already waiting for incoming data")]
    #[diagnostic(
        code(stream::concurrent_read),
        help("Only one task may read from a stream at a time.")
    )]
    ConcurrentRead { operation: &'static str },

    #[error("The stream is {}", if mode.is_read() { "read-only" } else { "write-only" })]
    #[diagnostic(code(stream::mode_mismatch))]
    ModeMismatch { mode: StreamMode },

    #[error("{0}")]
    #[diagnostic(code(stream::line_too_long))]
    LineTooLong(String),

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(stream::invalid_argument))]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    #[diagnostic(code(stream::invalid_state))]
    InvalidState(&'static str),

    #[error("Stream is not attached to a transport")]
    #[diagnostic(
        code(stream::detached),
        help("Attach a StreamProtocol and call connection_made() before writing.")
    )]
    Detached,

    #[error("Operation not supported by transport: {0}")]
    #[diagnostic(code(stream::unsupported))]
    Unsupported(&'static str),

    #[error("Operation cancelled")]
    #[diagnostic(code(stream::cancelled))]
    Cancelled,

    #[error("Transport error: {0}")]
    #[diagnostic(code(stream::transport))]
    Transport(Arc<std::io::Error>),
}

impl StreamError {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }
}

fn expected_label(expected: &Option<usize>) -> String {
    expected.map_or_else(|| "undefined".to_string(), |n| n.to_string())
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Transport(Arc::new(err))
    }
}

impl From<SyncError> for StreamError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Cancelled => StreamError::Cancelled,
            other => StreamError::InvalidArgument(other.to_string()),
        }
    }
}
