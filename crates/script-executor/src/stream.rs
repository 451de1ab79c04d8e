//! Per-stream reading and framing
//!
//! Each pipe of the child gets a read loop ([`pump`]) running on its own
//! task. The loop only moves bytes into the execution's event channel; the
//! [`StreamReader`] owned by the execution turns those bytes into pieces.

use async_channel::Sender;
use futures_lite::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::buffer::FramingBuffer;
use crate::event::{Event, OutputSource};

/// Size of a single read from a pipe
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Lifecycle of a reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Reading, no piece produced yet
    Open,
    /// Reading, at least one piece produced
    Streaming,
    /// End-of-stream reached or closed on request
    Closed,
}

/// Framing state for one output stream
#[derive(Debug)]
pub struct StreamReader {
    source: OutputSource,
    buffer: FramingBuffer,
    streaming: bool,
    closed: bool,
}

impl StreamReader {
    /// Create a reader for `source` framing on `delimiter`
    pub fn new(source: OutputSource, delimiter: impl Into<String>) -> Self {
        Self {
            source,
            buffer: FramingBuffer::new(delimiter),
            streaming: false,
            closed: false,
        }
    }

    /// The stream this reader handles
    pub fn source(&self) -> OutputSource {
        self.source
    }

    /// Current lifecycle state
    pub fn state(&self) -> ReaderState {
        if self.closed {
            ReaderState::Closed
        } else if self.streaming {
            ReaderState::Streaming
        } else {
            ReaderState::Open
        }
    }

    /// Whether a piece was ever produced
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Whether the reader was closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feed a chunk and return the pieces it completed, in order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.closed {
            debug!(source = %self.source, bytes = chunk.len(), "dropping chunk for closed reader");
            return Vec::new();
        }

        self.buffer.append(chunk);
        let pieces = self.buffer.extract_pieces();

        if !pieces.is_empty() && !self.streaming {
            debug!(source = %self.source, "reader started streaming");
            self.streaming = true;
        }

        pieces
    }

    /// Close the reader and drain the unframed tail.
    ///
    /// Returns `None` if the reader was already closed, so completion is
    /// only ever reported once.
    pub fn finish(&mut self) -> Option<Vec<String>> {
        if self.closed {
            debug!(source = %self.source, "reader already closed");
            return None;
        }

        self.closed = true;
        self.buffer.close();
        Some(self.buffer.remaining_tail())
    }

    /// Forget the accumulated history, keep framing state
    pub fn clear(&mut self) {
        self.buffer.clear_history();
    }

    /// Aggregated text of the stream
    pub fn full_text(&self) -> Option<String> {
        self.buffer.full_text()
    }
}

/// Read `reader` until end-of-stream, posting every chunk into `events`.
///
/// Ends with exactly one [`Event::Eof`]. Read errors other than interrupts
/// end the stream as well. If the receiving side is gone the loop stops
/// quietly.
pub(crate) async fn pump<R>(source: OutputSource, mut reader: R, events: Sender<Event>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if events.send(Event::Chunk(source, buf[..n].to_vec())).await.is_err() {
                    debug!(%source, "execution is gone, stopping reader");
                    return;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(%source, error = %e, "failed to read from pipe, treating as end-of-stream");
                break;
            }
        }
    }

    drop(reader);

    if events.send(Event::Eof(source)).await.is_err() {
        debug!(%source, "execution is gone before end-of-stream was delivered");
    }
}
