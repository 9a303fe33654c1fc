/*!
 * Test transport that records every call
 */

use bytes::Bytes;
use coop_sync::{StreamError, StreamResult, Transport};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub struct RecordingTransport {
    pub written: Mutex<Vec<u8>>,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub aborts: AtomicUsize,
    pub closing: AtomicBool,
    pub eof: AtomicBool,
    /// Reject pause/resume like a transport that cannot pace
    pub no_pacing: bool,
}

impl RecordingTransport {
    pub fn without_pacing() -> Self {
        Self {
            no_pacing: true,
            ..Self::default()
        }
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }
}

impl Transport for RecordingTransport {
    fn write(&self, data: Bytes) -> StreamResult<()> {
        self.written.lock().extend_from_slice(&data);
        Ok(())
    }

    fn write_eof(&self) -> StreamResult<()> {
        self.eof.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn can_write_eof(&self) -> bool {
        true
    }

    fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.closing.store(true, Ordering::SeqCst);
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    fn pause_reading(&self) -> StreamResult<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        if self.no_pacing {
            return Err(StreamError::Unsupported("pause_reading"));
        }
        Ok(())
    }

    fn resume_reading(&self) -> StreamResult<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        if self.no_pacing {
            return Err(StreamError::Unsupported("resume_reading"));
        }
        Ok(())
    }
}
