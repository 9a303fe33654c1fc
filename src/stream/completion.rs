/*!
 * Completions
 *
 * Handles returned by [`Stream::write`](super::Stream::write) and
 * [`Stream::close`](super::Stream::close). Awaiting either is optional.
 *
 * A write completion dropped without being awaited still lets a spawned
 * drain finish, and its failure is logged. A stream built without a
 * runtime handle defers the drain instead: if that completion is dropped
 * un-polled the drain never runs, which is logged at debug level.
 */

use crate::core::errors::{StreamError, StreamResult};
use crate::core::sync::{Cx, Signal, SignalError};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::debug;

enum Completion {
    /// Settled at write time
    Ready(Option<StreamResult<()>>),
    /// Drain running on the stream's runtime
    Spawned(JoinHandle<StreamResult<()>>),
    /// Drain that runs only when awaited
    Deferred {
        drain: BoxFuture<'static, StreamResult<()>>,
        polled: bool,
    },
}

/// Outcome of a write, settled once the transport accepts more data
///
/// A deferred completion (stream without a runtime handle) drains only
/// while it is polled.
pub struct WriteCompletion {
    state: Completion,
}

impl WriteCompletion {
    pub(crate) fn ready(result: StreamResult<()>) -> Self {
        Self {
            state: Completion::Ready(Some(result)),
        }
    }

    pub(crate) fn spawned(task: JoinHandle<StreamResult<()>>) -> Self {
        Self {
            state: Completion::Spawned(task),
        }
    }

    pub(crate) fn deferred<F>(drain: F) -> Self
    where
        F: Future<Output = StreamResult<()>> + Send + 'static,
    {
        Self {
            state: Completion::Deferred {
                drain: Box::pin(drain),
                polled: false,
            },
        }
    }

    /// True if the write needed no backpressure wait
    pub fn is_ready(&self) -> bool {
        matches!(self.state, Completion::Ready(_))
    }
}

impl fmt::Debug for WriteCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.state {
            Completion::Ready(_) => "ready",
            Completion::Spawned(_) => "spawned",
            Completion::Deferred { .. } => "deferred",
        };
        f.debug_struct("WriteCompletion").field("state", &kind).finish()
    }
}

impl Future for WriteCompletion {
    type Output = StreamResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            Completion::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(StreamError::InvalidState(
                    "write completion polled after finishing",
                ))))
            }
            Completion::Spawned(task) => match Pin::new(task).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(e)) if e.is_cancelled() => Poll::Ready(Err(StreamError::Cancelled)),
                Poll::Ready(Err(_)) => {
                    Poll::Ready(Err(StreamError::InvalidState("background drain panicked")))
                }
                Poll::Pending => Poll::Pending,
            },
            Completion::Deferred { drain, polled } => {
                *polled = true;
                drain.as_mut().poll(cx)
            }
        }
    }
}

impl Drop for WriteCompletion {
    fn drop(&mut self) {
        if let Completion::Deferred { polled: false, .. } = self.state {
            debug!("Deferred write completion dropped before polling; its drain never ran");
        }
    }
}

/// Close in progress, returned by [`Stream::close`](super::Stream::close)
///
/// Dropping it does not stop the close.
#[derive(Debug)]
pub struct Closing {
    closed: Option<Signal<(), StreamError>>,
}

impl Closing {
    /// `None` for a stream without a protocol
    pub(crate) fn new(closed: Option<Signal<(), StreamError>>) -> Self {
        Self { closed }
    }

    /// Wait until the protocol reports the connection closed
    pub async fn wait(self, cx: &Cx) -> StreamResult<()> {
        let closed = self.closed.ok_or(StreamError::Detached)?;
        match cx.suspend(&closed).await {
            Ok(()) => Ok(()),
            Err(SignalError::Failed(err)) => Err(err),
            Err(SignalError::Cancelled) => Err(StreamError::Cancelled),
        }
    }
}
