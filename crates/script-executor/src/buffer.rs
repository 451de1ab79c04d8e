//! Delimiter framing for one output stream
//!
//! A [`FramingBuffer`] accumulates the raw bytes of a single stream and cuts
//! them into *pieces* whenever the delimiter shows up. Alongside the framing
//! store it keeps the whole history of the stream, which is what the final
//! aggregate outcome is built from.

/// Delimiter used when none is configured
pub const DEFAULT_DELIMITER: &str = "~~~\n";

/// Byte accumulator that frames output into delimiter-separated pieces
#[derive(Debug, Clone)]
pub struct FramingBuffer {
    /// Bytes that have not been framed yet
    store: Vec<u8>,
    /// Everything ever appended, until cleared
    rest: Vec<u8>,
    /// Piece separator, fixed for the lifetime of the buffer
    delimiter: String,
    /// Prefix of `store` already known to hold no delimiter start
    scanned: usize,
    /// Set once the stream reached end-of-stream
    closed: bool,
}

impl Default for FramingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl FramingBuffer {
    /// Create an empty buffer framing on `delimiter`
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            store: Vec::new(),
            rest: Vec::new(),
            delimiter: delimiter.into(),
            scanned: 0,
            closed: false,
        }
    }

    /// The delimiter this buffer frames on
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append raw bytes. Ignored once the buffer is closed.
    pub fn append(&mut self, data: &[u8]) {
        if self.closed {
            return;
        }

        self.store.extend_from_slice(data);
        self.rest.extend_from_slice(data);
    }

    /// Cut every complete piece out of the store, in order.
    ///
    /// Each returned piece has its delimiter stripped. Incomplete trailing
    /// data stays in the store for the next call. When the buffer is closed
    /// the leftover tail is returned as a final piece.
    pub fn extract_pieces(&mut self) -> Vec<String> {
        let mut pieces = Vec::new();
        let delimiter = self.delimiter.as_bytes();

        if !delimiter.is_empty() {
            let mut start = 0;
            let mut from = self.scanned;
            while let Some(offset) = find(&self.store[from..], delimiter) {
                let end = from + offset;
                pieces.push(String::from_utf8_lossy(&self.store[start..end]).into_owned());
                start = end + delimiter.len();
                from = start;
            }

            self.store.drain(..start);
            // A delimiter may still begin in the last `len - 1` bytes
            self.scanned = self.store.len().saturating_sub(delimiter.len() - 1);
        }

        if self.closed {
            pieces.extend(self.remaining_tail());
        }

        pieces
    }

    /// Drain the unframed remainder as a single piece, if there is one
    pub fn remaining_tail(&mut self) -> Vec<String> {
        if self.store.is_empty() {
            return Vec::new();
        }

        let tail = std::mem::take(&mut self.store);
        self.scanned = 0;
        vec![String::from_utf8_lossy(&tail).into_owned()]
    }

    /// Mark the buffer closed. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whole stream history with delimiters removed
    ///
    /// `None` when nothing was appended since creation or the last
    /// [`clear_history`](Self::clear_history).
    pub fn full_text(&self) -> Option<String> {
        if self.rest.is_empty() {
            return None;
        }

        let delimiter = self.delimiter.as_bytes();
        if delimiter.is_empty() {
            return Some(String::from_utf8_lossy(&self.rest).into_owned());
        }

        let mut text = Vec::with_capacity(self.rest.len());
        let mut remaining = self.rest.as_slice();
        while let Some(pos) = find(remaining, delimiter) {
            text.extend_from_slice(&remaining[..pos]);
            remaining = &remaining[pos + delimiter.len()..];
        }
        text.extend_from_slice(remaining);

        Some(String::from_utf8_lossy(&text).into_owned())
    }

    /// Forget the stream history without touching pending framing state
    pub fn clear_history(&mut self) {
        self.rest.clear();
    }

    /// Data waiting for a delimiter
    pub fn pending(&self) -> String {
        String::from_utf8_lossy(&self.store).into_owned()
    }
}

/// Position of the first occurrence of `needle` in `haystack`
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
