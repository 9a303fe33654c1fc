/*!
 * Transport Trait
 *
 * Byte channel a [`Stream`](super::Stream) writes into. Incoming bytes
 * travel the other way, from the transport into a
 * [`StreamProtocol`](super::StreamProtocol).
 *
 * # Contract
 *
 * - Methods are called without any stream lock held, so a transport may
 *   call back into its protocol from `write`, `close`, or `abort`.
 * - `resume_reading` must not deliver buffered data synchronously; it
 *   schedules delivery instead.
 * - `pause_reading`/`resume_reading` return [`StreamError::Unsupported`]
 *   when the transport cannot pace, and the stream stops asking.
 */

use crate::core::errors::{StreamError, StreamResult};
use bytes::Bytes;
use std::fs::File;

pub trait Transport: Send + Sync {
    /// Queue bytes for the peer
    fn write(&self, data: Bytes) -> StreamResult<()>;

    /// Queue several buffers in order
    fn write_lines(&self, lines: &[Bytes]) -> StreamResult<()> {
        for line in lines {
            self.write(line.clone())?;
        }
        Ok(())
    }

    /// Half-close the write side once queued data is flushed
    fn write_eof(&self) -> StreamResult<()>;

    fn can_write_eof(&self) -> bool;

    /// Close after flushing; the protocol sees `connection_lost(None)`
    fn close(&self);

    /// Close immediately, discarding queued data
    fn abort(&self);

    fn is_closing(&self) -> bool;

    fn pause_reading(&self) -> StreamResult<()> {
        Err(StreamError::Unsupported("pause_reading"))
    }

    fn resume_reading(&self) -> StreamResult<()> {
        Err(StreamError::Unsupported("resume_reading"))
    }

    /// Optional transport metadata, such as `peername` or `sslcontext`
    fn get_extra_info(&self, _name: &str) -> Option<serde_json::Value> {
        None
    }

    /// Native zero-copy file transmission; returns bytes sent
    fn sendfile(
        &self,
        _file: &mut File,
        _offset: u64,
        _count: Option<usize>,
    ) -> StreamResult<usize> {
        Err(StreamError::Unsupported("sendfile"))
    }
}
