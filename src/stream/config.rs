/*!
 * Stream Configuration
 *
 * Runtime configuration and builder for [`Stream`] construction
 */

use super::stream::Stream;
use super::transport::Transport;
use super::types::StreamMode;
use crate::core::errors::{StreamError, StreamResult};
use crate::core::limits::DEFAULT_STREAM_LIMIT;
use crate::core::serde::deserialize_nonzero_usize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Stream configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Supported directions
    pub mode: StreamMode,
    /// Maximum chunk length for separator reads; reading pauses past twice this
    #[serde(deserialize_with = "deserialize_nonzero_usize")]
    pub limit: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            mode: StreamMode::ReadWrite,
            limit: DEFAULT_STREAM_LIMIT,
        }
    }
}

impl StreamConfig {
    pub const fn new(mode: StreamMode, limit: usize) -> Self {
        Self { mode, limit }
    }

    /// Read-only stream with the default limit
    pub const fn reader() -> Self {
        Self::new(StreamMode::Read, DEFAULT_STREAM_LIMIT)
    }

    /// Write-only stream with the default limit
    pub const fn writer() -> Self {
        Self::new(StreamMode::Write, DEFAULT_STREAM_LIMIT)
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn validate(&self) -> StreamResult<()> {
        if self.limit == 0 {
            return Err(StreamError::InvalidArgument(
                "Limit cannot be <= 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Stream`]
#[derive(Default)]
pub struct StreamBuilder {
    config: StreamConfig,
    handle: Option<Handle>,
    transport: Option<Arc<dyn Transport>>,
}

impl StreamBuilder {
    /// Create a new stream builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mode(mut self, mode: StreamMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.config.limit = limit;
        self
    }

    /// Runtime used to run background drains for un-awaited writes
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Attach a transport up front instead of through a protocol
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the stream
    pub fn build(self) -> StreamResult<Stream> {
        self.config.validate()?;
        let stream = Stream::from_config(self.config, self.handle);
        if let Some(transport) = self.transport {
            stream.set_transport(transport)?;
        }
        Ok(stream)
    }
}
