/*!
 * In-Memory Transport
 *
 * Connected pair of transports for tests and in-process plumbing.
 *
 * # Flow
 *
 * Bytes written on one side go straight to the peer's protocol unless
 * the peer has paused reading. While paused, they queue on the link; past
 * the high-water mark the writer's protocol is told to pause writing, and
 * it is resumed once the queue drains to the low-water mark.
 *
 * Queued data is delivered from a task spawned on the link's runtime when
 * the peer resumes reading, never from inside `resume_reading` itself.
 * Connection loss is delivered the same way.
 */

use super::config::{StreamBuilder, StreamConfig};
use super::protocol::StreamProtocol;
use super::stream::Stream;
use super::transport::Transport;
use crate::core::errors::{StreamError, StreamResult};
use crate::core::limits::{DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Bytes travelling in one direction
#[derive(Debug, Default)]
struct Pipe {
    queue: VecDeque<Bytes>,
    queued: usize,
    receiver_paused: bool,
    writer_paused: bool,
    eof_pending: bool,
    flush_scheduled: bool,
}

impl Pipe {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && !self.flush_scheduled
    }
}

#[derive(Debug, Default)]
struct LinkState {
    /// `pipes[i]` carries bytes written by side `i`
    pipes: [Pipe; 2],
    eof_sent: [bool; 2],
    closing: [bool; 2],
    lost: [bool; 2],
}

struct Link {
    state: Mutex<LinkState>,
    protocols: [Arc<StreamProtocol>; 2],
    handle: Handle,
    high_water: usize,
    low_water: usize,
}

enum Delivery {
    Data(Bytes),
    Eof,
}

#[inline]
const fn peer(side: usize) -> usize {
    1 - side
}

impl Link {
    /// Deliver queued data in direction `dir` until drained or paused
    fn flush(&self, dir: usize) {
        loop {
            let (delivery, resume_writer) = {
                let mut state = self.state.lock();
                let pipe = &mut state.pipes[dir];
                if pipe.receiver_paused {
                    pipe.flush_scheduled = false;
                    return;
                }
                match pipe.queue.pop_front() {
                    Some(chunk) => {
                        pipe.queued -= chunk.len();
                        let resume = pipe.writer_paused && pipe.queued <= self.low_water;
                        if resume {
                            pipe.writer_paused = false;
                        }
                        (Some(Delivery::Data(chunk)), resume)
                    }
                    None => {
                        pipe.flush_scheduled = false;
                        let eof = std::mem::take(&mut pipe.eof_pending);
                        (eof.then_some(Delivery::Eof), false)
                    }
                }
            };

            if resume_writer {
                self.protocols[dir].resume_writing();
            }
            match delivery {
                Some(Delivery::Data(chunk)) => self.protocols[peer(dir)].data_received(&chunk),
                Some(Delivery::Eof) => {
                    self.protocols[peer(dir)].eof_received();
                    return;
                }
                None => return,
            }
        }
    }

    /// Queue an EOF from `side`, delivering it now if nothing is queued
    fn send_eof(&self, side: usize) {
        let deliver_now = {
            let mut state = self.state.lock();
            if state.eof_sent[side] {
                return;
            }
            state.eof_sent[side] = true;
            let pipe = &mut state.pipes[side];
            if pipe.is_idle() {
                true
            } else {
                pipe.eof_pending = true;
                false
            }
        };
        if deliver_now {
            self.protocols[peer(side)].eof_received();
        }
    }

    fn defer_connection_lost(self: &Arc<Self>, side: usize, reset: bool) {
        let link = Arc::clone(self);
        self.handle.spawn(async move {
            let err = reset.then(|| {
                io::Error::new(io::ErrorKind::ConnectionReset, "Connection reset by peer")
            });
            link.protocols[side].connection_lost(err);
        });
    }
}

/// One end of an in-memory link
pub struct MemoryTransport {
    link: Arc<Link>,
    side: usize,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.link.state.lock();
        f.debug_struct("MemoryTransport")
            .field("side", &self.side)
            .field("queued", &state.pipes[self.side].queued)
            .field("closing", &state.closing[self.side])
            .finish()
    }
}

impl MemoryTransport {
    /// Bytes written on this side and still waiting for the peer
    pub fn write_buffer_size(&self) -> usize {
        self.link.state.lock().pipes[self.side].queued
    }
}

impl Transport for MemoryTransport {
    fn write(&self, data: Bytes) -> StreamResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let side = self.side;
        let (deliver, pause_writer) = {
            let mut state = self.link.state.lock();
            if state.eof_sent[side] {
                return Err(StreamError::InvalidState("Cannot call write() after write_eof()"));
            }
            if state.closing[side] {
                debug!(side, bytes = data.len(), "Write on closing memory transport dropped");
                return Ok(());
            }
            let pipe = &mut state.pipes[side];
            if pipe.receiver_paused || !pipe.is_idle() {
                pipe.queued += data.len();
                pipe.queue.push_back(data);
                let pause = pipe.queued > self.link.high_water && !pipe.writer_paused;
                if pause {
                    pipe.writer_paused = true;
                }
                (None, pause)
            } else {
                (Some(data), false)
            }
        };

        if pause_writer {
            self.link.protocols[side].pause_writing();
        }
        if let Some(data) = deliver {
            self.link.protocols[peer(side)].data_received(&data);
        }
        Ok(())
    }

    fn write_eof(&self) -> StreamResult<()> {
        self.link.send_eof(self.side);
        Ok(())
    }

    fn can_write_eof(&self) -> bool {
        true
    }

    fn close(&self) {
        {
            let mut state = self.link.state.lock();
            if state.closing[self.side] {
                return;
            }
            state.closing[self.side] = true;
            state.lost[self.side] = true;
        }
        self.link.send_eof(self.side);
        self.link.defer_connection_lost(self.side, false);
    }

    fn abort(&self) {
        let side = self.side;
        let (lose_self, lose_peer) = {
            let mut state = self.link.state.lock();
            state.closing[side] = true;
            state.closing[peer(side)] = true;
            state.pipes[side] = Pipe::default();
            state.pipes[peer(side)] = Pipe::default();
            let lose_self = !std::mem::replace(&mut state.lost[side], true);
            let lose_peer = !std::mem::replace(&mut state.lost[peer(side)], true);
            (lose_self, lose_peer)
        };
        if lose_self {
            self.link.defer_connection_lost(side, false);
        }
        if lose_peer {
            self.link.defer_connection_lost(peer(side), true);
        }
    }

    fn is_closing(&self) -> bool {
        self.link.state.lock().closing[self.side]
    }

    fn pause_reading(&self) -> StreamResult<()> {
        self.link.state.lock().pipes[peer(self.side)].receiver_paused = true;
        Ok(())
    }

    fn resume_reading(&self) -> StreamResult<()> {
        let dir = peer(self.side);
        let schedule = {
            let mut state = self.link.state.lock();
            let pipe = &mut state.pipes[dir];
            pipe.receiver_paused = false;
            let pending = !pipe.queue.is_empty() || pipe.eof_pending;
            if pending && !pipe.flush_scheduled {
                pipe.flush_scheduled = true;
                true
            } else {
                false
            }
        };
        if schedule {
            let link = Arc::clone(&self.link);
            self.link.handle.spawn(async move { link.flush(dir) });
        }
        Ok(())
    }

    fn get_extra_info(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "peername" => Some(serde_json::json!(format!("memory:{}", peer(self.side)))),
            "sockname" => Some(serde_json::json!(format!("memory:{}", self.side))),
            "write_buffer_limits" => Some(serde_json::json!([
                self.link.low_water,
                self.link.high_water
            ])),
            _ => None,
        }
    }
}

/// Two streams connected back to back
pub fn duplex(config: StreamConfig, handle: &Handle) -> StreamResult<(Stream, Stream)> {
    duplex_with_water_marks(config, handle, DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER)
}

/// [`duplex`] with explicit write-buffer water marks
pub fn duplex_with_water_marks(
    config: StreamConfig,
    handle: &Handle,
    high_water: usize,
    low_water: usize,
) -> StreamResult<(Stream, Stream)> {
    if low_water > high_water {
        return Err(StreamError::InvalidArgument(format!(
            "low water mark {} exceeds high water mark {}",
            low_water, high_water
        )));
    }

    let build = || {
        StreamBuilder::new()
            .with_config(config.clone())
            .with_handle(handle.clone())
            .build()
    };
    let left = build()?;
    let right = build()?;
    let protocols = [StreamProtocol::new(&left), StreamProtocol::new(&right)];

    let link = Arc::new(Link {
        state: Mutex::new(LinkState::default()),
        protocols: protocols.clone(),
        handle: handle.clone(),
        high_water,
        low_water,
    });

    for (side, protocol) in protocols.iter().enumerate() {
        let transport: Arc<dyn Transport> = Arc::new(MemoryTransport {
            link: Arc::clone(&link),
            side,
        });
        protocol.connection_made(transport);
    }

    debug!(high_water, low_water, limit = config.limit, "Memory duplex created");
    Ok((left, right))
}
