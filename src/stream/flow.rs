/*!
 * Flow Control
 *
 * Bridges the transport's write backpressure to [`Stream::drain`]. The
 * transport calls `pause_writing`/`resume_writing`; writers park in
 * `drain_helper` while paused.
 *
 * Drainers share one completion signal, so every task parked in a drain
 * is released by the same resume.
 *
 * [`Stream::drain`]: super::Stream::drain
 */

use crate::core::errors::{StreamError, StreamResult};
use crate::core::sync::{Cx, Signal, SignalError};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct FlowState {
    paused: bool,
    connection_lost: bool,
    drain_waiter: Option<Signal<(), StreamError>>,
}

/// Write-side pause/resume handshake
#[derive(Debug, Default)]
pub struct FlowControl {
    state: Mutex<FlowState>,
}

impl FlowControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport buffer went over its high-water mark
    pub fn pause_writing(&self) {
        let mut state = self.state.lock();
        if !state.paused {
            state.paused = true;
            debug!("Flow control pauses writing");
        }
    }

    /// Transport buffer drained below its low-water mark
    pub fn resume_writing(&self) {
        let waiter = {
            let mut state = self.state.lock();
            if !state.paused {
                return;
            }
            state.paused = false;
            state.drain_waiter.take()
        };
        debug!("Flow control resumes writing");
        if let Some(waiter) = waiter {
            waiter.resolve(());
        }
    }

    /// Mark the connection lost and release a writer parked on backpressure
    pub fn connection_lost(&self, err: Option<StreamError>) {
        let waiter = {
            let mut state = self.state.lock();
            state.connection_lost = true;
            if !state.paused {
                return;
            }
            state.drain_waiter.take()
        };
        if let Some(waiter) = waiter {
            match err {
                None => waiter.resolve(()),
                Some(err) => waiter.fail(err),
            };
        }
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    #[inline]
    pub fn is_connection_lost(&self) -> bool {
        self.state.lock().connection_lost
    }

    /// Suspend while writing is paused
    pub async fn drain_helper(&self, cx: &Cx) -> StreamResult<()> {
        let waiter = {
            let mut state = self.state.lock();
            if state.connection_lost {
                return Err(StreamError::ConnectionReset);
            }
            if !state.paused {
                return Ok(());
            }
            match &state.drain_waiter {
                Some(waiter) if !waiter.is_done() => waiter.clone(),
                _ => {
                    let waiter = Signal::new();
                    state.drain_waiter = Some(waiter.clone());
                    waiter
                }
            }
        };

        let outcome = cx.suspend(&waiter).await;
        match outcome {
            Ok(()) => Ok(()),
            Err(SignalError::Failed(err)) => Err(err),
            Err(SignalError::Cancelled) => Err(StreamError::Cancelled),
        }
    }
}
