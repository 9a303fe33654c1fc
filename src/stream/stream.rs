/*!
 * Stream
 *
 * Buffered bidirectional byte stream over a [`Transport`].
 *
 * # Read Side
 *
 * Incoming bytes are appended by [`Stream::feed_data`] and consumed by the
 * `read*` family. Reading pauses the transport once more than
 * `2 * limit` bytes are buffered and resumes it once the buffer drains to
 * `limit` or less. Only one task may wait for data at a time.
 *
 * # Write Side
 *
 * Writes go straight to the transport. [`Stream::drain`] parks while the
 * transport reports backpressure through the protocol's
 * [`FlowControl`](super::FlowControl).
 *
 * # Locking
 *
 * Stream state sits behind one mutex that is never held while calling
 * into the transport, so transports may call back into the stream.
 */

use super::completion::{Closing, WriteCompletion};
use super::config::{StreamBuilder, StreamConfig};
use super::protocol::StreamProtocol;
use super::transport::Transport;
use super::types::{StreamMode, StreamStats};
use crate::core::errors::{LimitKind, StreamError, StreamResult};
use crate::core::limits::{
    DEFAULT_SEPARATOR, DEFAULT_STREAM_LIMIT, PAUSE_FACTOR, SENDFILE_FALLBACK_CHUNK,
};
use crate::core::sync::{Cx, Signal, SignalError};
use crate::monitoring::span_operation;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::fmt;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Buffered byte stream
///
/// Cloning yields another handle to the same stream.
#[derive(Clone)]
pub struct Stream {
    shared: Arc<StreamShared>,
}

pub(crate) struct StreamShared {
    mode: StreamMode,
    limit: usize,
    handle: Option<Handle>,
    inner: Mutex<StreamInner>,
}

struct StreamInner {
    buffer: BytesMut,
    eof: bool,
    /// Reading is paused at the transport
    paused: bool,
    /// Cleared once the transport refuses to pause
    pacing: bool,
    waiter: Option<Signal<(), StreamError>>,
    exception: Option<StreamError>,
    transport: Option<Arc<dyn Transport>>,
    protocol: Option<Arc<StreamProtocol>>,
    bytes_received: u64,
    bytes_consumed: u64,
}

impl StreamInner {
    fn consume(&mut self, n: usize) -> Bytes {
        self.bytes_consumed += n as u64;
        self.buffer.split_to(n).freeze()
    }

    fn wakeup_waiter(&mut self) {
        if let Some(waiter) = self.waiter.take() {
            waiter.resolve(());
        }
    }
}

/// Outcome of one separator scan
enum Scan {
    Found(Bytes, Option<Arc<dyn Transport>>),
    Wait,
}

impl Stream {
    /// Create a detached stream
    pub fn new(mode: StreamMode, limit: usize) -> StreamResult<Self> {
        StreamBuilder::new()
            .with_config(StreamConfig::new(mode, limit))
            .build()
    }

    pub fn builder() -> StreamBuilder {
        StreamBuilder::new()
    }

    pub(crate) fn from_config(config: StreamConfig, handle: Option<Handle>) -> Self {
        Self {
            shared: Arc::new(StreamShared {
                mode: config.mode,
                limit: config.limit,
                handle,
                inner: Mutex::new(StreamInner {
                    buffer: BytesMut::new(),
                    eof: false,
                    paused: false,
                    pacing: true,
                    waiter: None,
                    exception: None,
                    transport: None,
                    protocol: None,
                    bytes_received: 0,
                    bytes_consumed: 0,
                }),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<StreamShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn downgrade(&self) -> Weak<StreamShared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn attach_protocol(&self, protocol: Arc<StreamProtocol>) {
        self.shared.inner.lock().protocol = Some(protocol);
    }

    #[inline]
    pub fn mode(&self) -> StreamMode {
        self.shared.mode
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.shared.inner.lock().transport.clone()
    }

    pub fn protocol(&self) -> Option<Arc<StreamProtocol>> {
        self.shared.inner.lock().protocol.clone()
    }

    fn attached_transport(&self) -> StreamResult<Arc<dyn Transport>> {
        self.transport().ok_or(StreamError::Detached)
    }

    /// Bind the stream to its transport; rebinding the same one is a no-op
    pub fn set_transport(&self, transport: Arc<dyn Transport>) -> StreamResult<()> {
        let mut inner = self.shared.inner.lock();
        match &inner.transport {
            Some(current) if Arc::ptr_eq(current, &transport) => Ok(()),
            Some(_) => Err(StreamError::InvalidState("Transport already set")),
            None => {
                inner.transport = Some(transport);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Feeding
    // =========================================================================

    /// Append incoming bytes and wake the waiting reader
    pub fn feed_data(&self, data: &[u8]) -> StreamResult<()> {
        self.shared.mode.check_read()?;
        let pause = {
            let mut inner = self.shared.inner.lock();
            if inner.eof {
                return Err(StreamError::InvalidState("feed_data after feed_eof"));
            }
            if data.is_empty() {
                return Ok(());
            }

            inner.buffer.extend_from_slice(data);
            inner.bytes_received += data.len() as u64;
            inner.wakeup_waiter();

            if inner.pacing
                && !inner.paused
                && inner.buffer.len() > PAUSE_FACTOR * self.shared.limit
            {
                let transport = inner.transport.clone();
                if transport.is_some() {
                    inner.paused = true;
                }
                transport
            } else {
                None
            }
        };

        if let Some(transport) = pause {
            match transport.pause_reading() {
                Ok(()) => debug!(limit = self.shared.limit, "Stream pauses reading"),
                Err(StreamError::Unsupported(_)) => {
                    let mut inner = self.shared.inner.lock();
                    inner.paused = false;
                    inner.pacing = false;
                    debug!("Transport cannot pause reading, buffering without limit");
                }
                Err(e) => {
                    self.shared.inner.lock().paused = false;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Record end of input and wake the waiting reader
    pub fn feed_eof(&self) -> StreamResult<()> {
        self.shared.mode.check_read()?;
        let mut inner = self.shared.inner.lock();
        inner.eof = true;
        inner.wakeup_waiter();
        Ok(())
    }

    /// True once EOF was fed and the buffer is empty
    pub fn at_eof(&self) -> StreamResult<bool> {
        self.shared.mode.check_read()?;
        let inner = self.shared.inner.lock();
        Ok(inner.eof && inner.buffer.is_empty())
    }

    pub fn exception(&self) -> Option<StreamError> {
        self.shared.inner.lock().exception.clone()
    }

    /// Store an error for every later read and fail the waiting reader
    pub fn set_exception(&self, err: StreamError) {
        let mut inner = self.shared.inner.lock();
        inner.exception = Some(err.clone());
        if let Some(waiter) = inner.waiter.take() {
            waiter.fail(err);
        }
    }

    fn maybe_resume(&self, inner: &mut StreamInner) -> Option<Arc<dyn Transport>> {
        if inner.paused && inner.buffer.len() <= self.shared.limit {
            inner.paused = false;
            inner.transport.clone()
        } else {
            None
        }
    }

    fn resume_transport(&self, transport: Option<Arc<dyn Transport>>) {
        let Some(transport) = transport else {
            return;
        };
        match transport.resume_reading() {
            Ok(()) => debug!("Stream resumes reading"),
            Err(StreamError::Unsupported(_)) => self.shared.inner.lock().pacing = false,
            Err(e) => warn!(error = %e, "Failed to resume reading"),
        }
    }

    /// Park until data or EOF arrives
    ///
    /// Resumes a paused transport first; waiting on a paused transport
    /// would never finish.
    async fn wait_for_data(&self, cx: &Cx, operation: &'static str) -> StreamResult<()> {
        let (signal, resume) = {
            let mut inner = self.shared.inner.lock();
            if inner.waiter.is_some() {
                return Err(StreamError::ConcurrentRead { operation });
            }
            debug_assert!(!inner.eof, "wait_for_data after EOF");

            let resume = if inner.paused {
                inner.paused = false;
                inner.transport.clone()
            } else {
                None
            };
            let signal = Signal::new();
            inner.waiter = Some(signal.clone());
            (signal, resume)
        };
        self.resume_transport(resume);

        let slot = ReadWaiter {
            shared: &self.shared,
            signal,
        };
        let outcome = cx.suspend(&slot.signal).await;
        match outcome {
            Ok(()) => Ok(()),
            Err(SignalError::Failed(err)) => Err(err),
            Err(SignalError::Cancelled) => Err(StreamError::Cancelled),
        }
    }

    fn check_exception(&self) -> StreamResult<()> {
        match &self.shared.inner.lock().exception {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Read up to `n` bytes
    ///
    /// Waits for at least one byte unless EOF was reached. `n == 0`
    /// returns an empty buffer immediately.
    pub async fn read(&self, cx: &Cx, n: usize) -> StreamResult<Bytes> {
        self.shared.mode.check_read()?;
        self.check_exception()?;
        if n == 0 {
            return Ok(Bytes::new());
        }

        let empty = {
            let inner = self.shared.inner.lock();
            inner.buffer.is_empty() && !inner.eof
        };
        if empty {
            self.wait_for_data(cx, "read").await?;
        }

        let (data, resume) = {
            let mut inner = self.shared.inner.lock();
            let take = n.min(inner.buffer.len());
            let data = inner.consume(take);
            (data, self.maybe_resume(&mut inner))
        };
        self.resume_transport(resume);
        Ok(data)
    }

    /// Read until EOF in `limit`-sized chunks
    pub async fn read_to_end(&self, cx: &Cx) -> StreamResult<Bytes> {
        let mut blocks = BytesMut::new();
        loop {
            let block = self.read(cx, self.shared.limit).await?;
            if block.is_empty() {
                break;
            }
            blocks.extend_from_slice(&block);
        }
        Ok(blocks.freeze())
    }

    /// Read exactly `n` bytes
    ///
    /// Fails with [`StreamError::IncompleteRead`] carrying whatever was
    /// buffered if EOF arrives first.
    pub async fn read_exactly(&self, cx: &Cx, n: usize) -> StreamResult<Bytes> {
        self.shared.mode.check_read()?;
        self.check_exception()?;
        if n == 0 {
            return Ok(Bytes::new());
        }

        loop {
            {
                let mut inner = self.shared.inner.lock();
                if inner.buffer.len() >= n {
                    let data = inner.consume(n);
                    let resume = self.maybe_resume(&mut inner);
                    drop(inner);
                    self.resume_transport(resume);
                    return Ok(data);
                }
                if inner.eof {
                    let len = inner.buffer.len();
                    let partial = inner.consume(len);
                    return Err(StreamError::IncompleteRead {
                        partial,
                        expected: Some(n),
                    });
                }
            }
            self.wait_for_data(cx, "read_exactly").await?;
        }
    }

    /// Read through the next occurrence of `separator`, inclusive
    ///
    /// # Errors
    ///
    /// - [`StreamError::LimitExceeded`] when no separator turns up within
    ///   `limit` bytes, or the one found lies past `limit`; data stays
    ///   buffered.
    /// - [`StreamError::IncompleteRead`] on EOF before a match; the buffer
    ///   is handed back in the error and cleared.
    pub async fn read_until(&self, cx: &Cx, separator: &[u8]) -> StreamResult<Bytes> {
        self.shared.mode.check_read()?;
        let seplen = separator.len();
        if seplen == 0 {
            return Err(StreamError::InvalidArgument(
                "Separator should be at least one-byte string".to_string(),
            ));
        }
        self.check_exception()?;

        // Bytes before `offset` are known not to start a match.
        let mut offset = 0;
        loop {
            match self.scan(separator, &mut offset)? {
                Scan::Found(chunk, resume) => {
                    self.resume_transport(resume);
                    return Ok(chunk);
                }
                Scan::Wait => self.wait_for_data(cx, "read_until").await?,
            }
        }
    }

    fn scan(&self, separator: &[u8], offset: &mut usize) -> StreamResult<Scan> {
        let limit = self.shared.limit;
        let seplen = separator.len();
        let mut inner = self.shared.inner.lock();
        let buflen = inner.buffer.len();

        if buflen >= *offset + seplen {
            let found = inner.buffer[*offset..]
                .windows(seplen)
                .position(|window| window == separator)
                .map(|pos| *offset + pos);

            if let Some(isep) = found {
                if isep > limit {
                    return Err(StreamError::LimitExceeded {
                        kind: LimitKind::FoundBeyondLimit,
                        consumed: isep,
                    });
                }
                let chunk = inner.consume(isep + seplen);
                let resume = self.maybe_resume(&mut inner);
                return Ok(Scan::Found(chunk, resume));
            }

            *offset = buflen + 1 - seplen;
            if *offset > limit {
                return Err(StreamError::LimitExceeded {
                    kind: LimitKind::NotFound,
                    consumed: *offset,
                });
            }
        }

        // A final chunk may complete the separator, so EOF is checked last.
        if inner.eof {
            let partial = inner.consume(buflen);
            return Err(StreamError::IncompleteRead {
                partial,
                expected: None,
            });
        }
        Ok(Scan::Wait)
    }

    /// Read one `\n`-terminated line
    ///
    /// Returns a partial line at EOF and an empty buffer once exhausted.
    /// On an overlong line the offending data is discarded (through the
    /// separator if one was found, otherwise the whole buffer) before
    /// [`StreamError::LineTooLong`] is returned.
    pub async fn read_line(&self, cx: &Cx) -> StreamResult<Bytes> {
        self.shared.mode.check_read()?;
        match self.read_until(cx, DEFAULT_SEPARATOR).await {
            Ok(line) => Ok(line),
            Err(StreamError::IncompleteRead { partial, .. }) => Ok(partial),
            Err(StreamError::LimitExceeded { kind, consumed }) => {
                let resume = {
                    let mut inner = self.shared.inner.lock();
                    let through_separator = inner
                        .buffer
                        .get(consumed..)
                        .is_some_and(|rest| rest.starts_with(DEFAULT_SEPARATOR));
                    let discard = if through_separator {
                        consumed + DEFAULT_SEPARATOR.len()
                    } else {
                        inner.buffer.len()
                    };
                    inner.consume(discard);
                    self.maybe_resume(&mut inner)
                };
                self.resume_transport(resume);
                Err(StreamError::LineTooLong(kind.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Successive lines until an empty read at EOF
    ///
    /// The sequence stops after yielding the first error.
    pub fn lines<'a>(
        &'a self,
        cx: &'a Cx,
    ) -> impl futures::Stream<Item = StreamResult<Bytes>> + Send + 'a {
        async_stream::stream! {
            loop {
                match self.read_line(cx).await {
                    Ok(line) if line.is_empty() => break,
                    Ok(line) => yield Ok(line),
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Send bytes to the transport
    ///
    /// The returned completion resolves at once unless the transport is
    /// applying backpressure, in which case it drains in the background.
    pub fn write(&self, data: impl AsRef<[u8]>) -> StreamResult<WriteCompletion> {
        self.shared.mode.check_write()?;
        let transport = self.attached_transport()?;
        transport.write(Bytes::copy_from_slice(data.as_ref()))?;
        Ok(self.fast_drain(&transport))
    }

    /// Send several buffers in order
    pub fn write_lines<I, B>(&self, lines: I) -> StreamResult<WriteCompletion>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.shared.mode.check_write()?;
        let transport = self.attached_transport()?;
        let lines: Vec<Bytes> = lines
            .into_iter()
            .map(|line| Bytes::copy_from_slice(line.as_ref()))
            .collect();
        transport.write_lines(&lines)?;
        Ok(self.fast_drain(&transport))
    }

    fn fast_drain(&self, transport: &Arc<dyn Transport>) -> WriteCompletion {
        if let Some(err) = self.exception() {
            return WriteCompletion::ready(Err(err));
        }
        if !transport.is_closing() {
            match self.protocol() {
                Some(protocol) if protocol.flow().is_connection_lost() => {
                    return WriteCompletion::ready(Err(StreamError::ConnectionReset));
                }
                Some(protocol) if protocol.flow().is_paused() => {}
                _ => return WriteCompletion::ready(Ok(())),
            }
        }

        let stream = self.clone();
        match &self.shared.handle {
            Some(handle) => WriteCompletion::spawned(handle.spawn(async move {
                let cx = Cx::new();
                let result = stream.drain(&cx).await;
                if let Err(e) = &result {
                    debug!(error = %e, "Background drain after write failed");
                }
                result
            })),
            None => WriteCompletion::deferred(async move {
                let cx = Cx::new();
                stream.drain(&cx).await
            }),
        }
    }

    pub fn write_eof(&self) -> StreamResult<()> {
        self.shared.mode.check_write()?;
        self.attached_transport()?.write_eof()
    }

    pub fn can_write_eof(&self) -> bool {
        if !self.shared.mode.is_write() {
            return false;
        }
        self.transport().is_some_and(|t| t.can_write_eof())
    }

    /// Wait until the transport accepts more data
    ///
    /// Fails with the stored exception, or with
    /// [`StreamError::ConnectionReset`] once the connection is lost.
    pub async fn drain(&self, cx: &Cx) -> StreamResult<()> {
        self.shared.mode.check_write()?;
        self.check_exception()?;
        let transport = self.attached_transport()?;
        if transport.is_closing() {
            // Let a pending connection_lost() land first.
            tokio::task::yield_now().await;
        }
        match self.protocol() {
            Some(protocol) => protocol.flow().drain_helper(cx).await,
            None => Ok(()),
        }
    }

    /// Send a file, natively if the transport can, else in chunks
    ///
    /// Returns the number of bytes sent.
    pub async fn sendfile(
        &self,
        cx: &Cx,
        file: &mut File,
        offset: u64,
        count: Option<usize>,
        fallback: bool,
    ) -> StreamResult<usize> {
        let op = span_operation("sendfile");
        self.drain(cx).await?;
        let transport = self.attached_transport()?;
        match transport.sendfile(file, offset, count) {
            Ok(sent) => {
                op.record_items_processed(sent);
                return Ok(sent);
            }
            Err(StreamError::Unsupported(_)) if fallback => {}
            Err(e) => {
                op.record_error(&e.to_string());
                return Err(e);
            }
        }

        // Reads go through the blocking pool so other tasks keep running.
        let mut reader = tokio::fs::File::from_std(file.try_clone()?);
        reader.seek(SeekFrom::Start(offset)).await?;
        let chunk = count.map_or(SENDFILE_FALLBACK_CHUNK, |c| c.min(SENDFILE_FALLBACK_CHUNK));
        let mut buf = vec![0u8; chunk.max(1)];
        let mut sent = 0;
        loop {
            let want = match count {
                Some(count) => (count - sent).min(buf.len()),
                None => buf.len(),
            };
            if want == 0 {
                break;
            }
            let n = reader.read(&mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            transport.write(Bytes::copy_from_slice(&buf[..n]))?;
            self.drain(cx).await?;
            sent += n;
        }
        drop(reader);
        file.seek(SeekFrom::Start(offset + sent as u64))?;
        op.record_items_processed(sent);
        debug!(sent, "sendfile fallback finished");
        Ok(sent)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the transport
    ///
    /// The returned [`Closing`] settles like [`Stream::wait_closed`].
    pub fn close(&self) -> StreamResult<Closing> {
        self.attached_transport()?.close();
        Ok(Closing::new(self.protocol().map(|p| p.close_waiter())))
    }

    pub fn is_closing(&self) -> bool {
        self.transport().is_some_and(|t| t.is_closing())
    }

    /// Abort the transport and wait for the close to land
    pub async fn abort(&self, cx: &Cx) -> StreamResult<()> {
        self.attached_transport()?.abort();
        self.wait_closed(cx).await
    }

    /// Wait until the protocol reports the connection closed
    pub async fn wait_closed(&self, cx: &Cx) -> StreamResult<()> {
        Closing::new(self.protocol().map(|p| p.close_waiter()))
            .wait(cx)
            .await
    }

    /// Transport metadata, or `default` if the transport has none
    pub fn get_extra_info(&self, name: &str, default: serde_json::Value) -> serde_json::Value {
        self.transport()
            .and_then(|t| t.get_extra_info(name))
            .unwrap_or(default)
    }

    pub fn stats(&self) -> StreamStats {
        let inner = self.shared.inner.lock();
        let flow = inner.protocol.as_ref().map(|p| p.flow());
        StreamStats {
            mode: self.shared.mode,
            limit: self.shared.limit,
            buffered: inner.buffer.len(),
            eof: inner.eof,
            reading_paused: inner.paused,
            writing_paused: flow.is_some_and(|f| f.is_paused()),
            pacing: inner.pacing,
            waiting_reader: inner.waiter.is_some(),
            attached: inner.transport.is_some(),
            closing: inner.transport.as_ref().is_some_and(|t| t.is_closing()),
            connection_lost: flow.is_some_and(|f| f.is_connection_lost()),
            exception: inner.exception.as_ref().map(|e| e.to_string()),
            bytes_received: inner.bytes_received,
            bytes_consumed: inner.bytes_consumed,
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        let mut info = vec![format!("mode={}", self.shared.mode)];
        if !inner.buffer.is_empty() {
            info.push(format!("{} bytes", inner.buffer.len()));
        }
        if inner.eof {
            info.push("eof".to_string());
        }
        if self.shared.limit != DEFAULT_STREAM_LIMIT {
            info.push(format!("limit={}", self.shared.limit));
        }
        if let Some(waiter) = &inner.waiter {
            info.push(format!("waiter={:?}", waiter));
        }
        if let Some(exception) = &inner.exception {
            info.push(format!("exception={}", exception));
        }
        if inner.transport.is_some() {
            info.push("transport".to_string());
        }
        if inner.paused {
            info.push("paused".to_string());
        }
        write!(f, "<Stream {}>", info.join(" "))
    }
}

impl Drop for StreamShared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(transport) = inner.transport.take() {
            if !transport.is_closing() {
                warn!(
                    mode = %self.mode,
                    "An open stream was dropped without close(); aborting its transport"
                );
                transport.abort();
            }
        }
    }
}

/// Clears the stream's waiter slot however the wait ends
struct ReadWaiter<'a> {
    shared: &'a StreamShared,
    signal: Signal<(), StreamError>,
}

impl Drop for ReadWaiter<'_> {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        if inner
            .waiter
            .as_ref()
            .is_some_and(|waiter| waiter.same(&self.signal))
        {
            inner.waiter = None;
        }
    }
}
