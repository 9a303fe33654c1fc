/*!
 * Stream Protocol
 *
 * Receives transport callbacks and forwards them to a [`Stream`]. Holds
 * only a weak reference to the stream so an abandoned stream can be
 * dropped while its transport is still alive.
 */

use super::flow::FlowControl;
use super::stream::{Stream, StreamShared};
use super::transport::Transport;
use crate::core::errors::StreamError;
use crate::core::sync::Signal;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Transport-facing half of a stream
pub struct StreamProtocol {
    stream: Mutex<Option<Weak<StreamShared>>>,
    flow: FlowControl,
    closed: Signal<(), StreamError>,
    over_tls: AtomicBool,
}

impl std::fmt::Debug for StreamProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProtocol")
            .field("attached", &self.stream().is_some())
            .field("flow", &self.flow)
            .field("closed", &self.closed.is_done())
            .finish()
    }
}

impl StreamProtocol {
    /// Create a protocol bound to `stream` and attach it
    pub fn new(stream: &Stream) -> Arc<Self> {
        let protocol = Arc::new(Self {
            stream: Mutex::new(Some(stream.downgrade())),
            flow: FlowControl::new(),
            closed: Signal::new(),
            over_tls: AtomicBool::new(false),
        });
        stream.attach_protocol(Arc::clone(&protocol));
        protocol
    }

    fn stream(&self) -> Option<Stream> {
        self.stream
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Stream::from_shared)
    }

    #[inline]
    pub fn flow(&self) -> &FlowControl {
        &self.flow
    }

    /// Signal settled when the connection is lost
    pub fn close_waiter(&self) -> Signal<(), StreamError> {
        self.closed.clone()
    }

    /// Transport is up; bind it to the stream
    ///
    /// If the stream is already gone the transport is aborted.
    pub fn connection_made(&self, transport: Arc<dyn Transport>) {
        let Some(stream) = self.stream() else {
            warn!("An open stream was dropped before its connection was made; aborting transport");
            transport.abort();
            return;
        };

        let tls = transport
            .get_extra_info("sslcontext")
            .is_some_and(|ctx| !ctx.is_null());
        self.over_tls.store(tls, Ordering::Relaxed);

        if let Err(e) = stream.set_transport(transport) {
            warn!(error = %e, "connection_made on a stream that already has a transport");
        }
    }

    /// Incoming bytes
    pub fn data_received(&self, data: &[u8]) {
        if let Some(stream) = self.stream() {
            if let Err(e) = stream.feed_data(data) {
                warn!(error = %e, bytes = data.len(), "Dropped incoming data");
            }
        }
    }

    /// Peer half-closed. Returns `true` to keep the transport open.
    pub fn eof_received(&self) -> bool {
        if let Some(stream) = self.stream() {
            if stream.mode().is_read() {
                if let Err(e) = stream.feed_eof() {
                    debug!(error = %e, "Ignoring EOF");
                }
            }
        }
        !self.over_tls.load(Ordering::Relaxed)
    }

    /// Connection is gone, cleanly (`None`) or with an error
    pub fn connection_lost(&self, err: Option<io::Error>) {
        let err = err.map(StreamError::from);
        if let Some(stream) = self.stream() {
            match &err {
                None if stream.mode().is_read() => {
                    if let Err(e) = stream.feed_eof() {
                        debug!(error = %e, "Ignoring EOF on connection loss");
                    }
                }
                None => {}
                Some(e) => stream.set_exception(e.clone()),
            }
        }

        match &err {
            None => self.closed.resolve(()),
            Some(e) => self.closed.fail(e.clone()),
        };
        debug!(error = ?err.as_ref().map(|e| e.to_string()), "Connection lost");

        self.flow.connection_lost(err);
        *self.stream.lock() = None;
    }

    pub fn pause_writing(&self) {
        self.flow.pause_writing();
    }

    pub fn resume_writing(&self) {
        self.flow.resume_writing();
    }
}
