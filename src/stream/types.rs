/*!
 * Stream Types
 * Capability modes and statistics snapshots
 */

use crate::core::errors::{StreamError, StreamResult};
use crate::core::serde::{is_false, is_zero_u64, is_zero_usize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which directions a stream supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    Read,
    Write,
    #[default]
    ReadWrite,
}

impl StreamMode {
    #[inline]
    pub const fn is_read(self) -> bool {
        matches!(self, StreamMode::Read | StreamMode::ReadWrite)
    }

    #[inline]
    pub const fn is_write(self) -> bool {
        matches!(self, StreamMode::Write | StreamMode::ReadWrite)
    }

    #[inline]
    pub(crate) fn check_read(self) -> StreamResult<()> {
        if self.is_read() {
            Ok(())
        } else {
            Err(StreamError::ModeMismatch { mode: self })
        }
    }

    #[inline]
    pub(crate) fn check_write(self) -> StreamResult<()> {
        if self.is_write() {
            Ok(())
        } else {
            Err(StreamError::ModeMismatch { mode: self })
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamMode::Read => write!(f, "READ"),
            StreamMode::Write => write!(f, "WRITE"),
            StreamMode::ReadWrite => write!(f, "READWRITE"),
        }
    }
}

/// Point-in-time view of a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamStats {
    pub mode: StreamMode,
    pub limit: usize,
    #[serde(skip_serializing_if = "is_zero_usize", default)]
    pub buffered: usize,
    #[serde(skip_serializing_if = "is_false", default)]
    pub eof: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub reading_paused: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub writing_paused: bool,
    /// False once the transport has refused to pause reading
    pub pacing: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub waiting_reader: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub attached: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub closing: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub connection_lost: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exception: Option<String>,
    #[serde(skip_serializing_if = "is_zero_u64", default)]
    pub bytes_received: u64,
    #[serde(skip_serializing_if = "is_zero_u64", default)]
    pub bytes_consumed: u64,
}
