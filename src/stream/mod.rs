/*!
 * Streams
 *
 * Buffered byte streams over callback-driven transports.
 *
 * # Layers
 *
 * - [`Transport`]: the byte pipe (socket, pipe, in-memory link)
 * - [`StreamProtocol`]: receives transport callbacks and feeds the stream
 * - [`FlowControl`]: tracks write backpressure reported by the transport
 * - [`Stream`]: the user-facing reader and writer
 *
 * [`duplex`] connects two streams through an in-memory transport.
 */

mod completion;
mod config;
mod flow;
mod memory;
mod protocol;
#[allow(clippy::module_inception)]
mod stream;
mod transport;
mod types;

pub use completion::{Closing, WriteCompletion};
pub use config::{StreamBuilder, StreamConfig};
pub use flow::FlowControl;
pub use memory::{duplex, duplex_with_water_marks, MemoryTransport};
pub use protocol::StreamProtocol;
pub use stream::Stream;
pub use transport::Transport;
pub use types::{StreamMode, StreamStats};
