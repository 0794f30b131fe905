//! Client side capture of one exchange.
//!
//! libcurl hands the [`CaptureSink`] every body fragment and every raw header
//! line, trailer lines included. Body bytes go into a fixed size
//! [`CaptureBuffer`]; header lines are matched byte for byte against the two
//! markers the checked response must carry.

use std::mem;

use curl::easy::{Handler, WriteError};
use tracing::warn;

/// Default capacity of a capture buffer, comfortably above the expected body.
pub const DEFAULT_CAPACITY: usize = 2048;

/// Header line announcing chunked framing, as received on the wire.
pub const CHUNKED_MARKER: &[u8] = b"Transfer-Encoding: chunked\r\n";

/// Trailer line sent after the last chunk.
pub const TRAILER_MARKER: &[u8] = b"Footer: working\r\n";

/// Fixed capacity body storage.
///
/// A write that doesn't fit is refused as a whole and latches the overflow
/// flag; nothing is ever truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureBuffer {
    data: Vec<u8>,
    capacity: usize,
    overflowed: bool,
}

impl CaptureBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { data: Vec::with_capacity(capacity), capacity, overflowed: false }
    }

    /// Appends `bytes`, returns `false` when they don't fit.
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        if self.overflowed || bytes.len() > self.capacity - self.data.len() {
            self.overflowed = true;
            return false;
        }
        self.data.extend_from_slice(bytes);
        true
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// What the header callback has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderObservations {
    chunked_lines: u32,
    trailer_lines: u32,
}

impl HeaderObservations {
    /// Matches one raw header line, line terminator included.
    pub fn observe(&mut self, line: &[u8]) {
        if line == CHUNKED_MARKER {
            self.chunked_lines += 1;
        } else if line == TRAILER_MARKER {
            self.trailer_lines += 1;
        }
    }

    pub fn saw_chunked_marker(&self) -> bool {
        self.chunked_lines > 0
    }

    pub fn saw_trailer_marker(&self) -> bool {
        self.trailer_lines > 0
    }

    /// How often the chunked marker line was received.
    pub fn chunked_lines(&self) -> u32 {
        self.chunked_lines
    }

    /// How often the trailer marker line was received.
    pub fn trailer_lines(&self) -> u32 {
        self.trailer_lines
    }
}

/// The libcurl callback target of one transfer.
#[derive(Debug, Default)]
pub struct CaptureSink {
    body: CaptureBuffer,
    headers: HeaderObservations,
}

impl CaptureSink {
    pub fn new(capacity: usize) -> Self {
        Self { body: CaptureBuffer::new(capacity), headers: HeaderObservations::default() }
    }

    pub fn body(&self) -> &CaptureBuffer {
        &self.body
    }

    pub fn headers(&self) -> &HeaderObservations {
        &self.headers
    }

    /// Takes what was captured so far, leaving an empty sink of the same capacity.
    pub fn renew(&mut self) -> Self {
        mem::replace(self, Self::new(self.body.capacity()))
    }

    pub fn into_parts(self) -> (CaptureBuffer, HeaderObservations) {
        (self.body, self.headers)
    }
}

impl Handler for CaptureSink {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if self.body.write(data) {
            return Ok(data.len());
        }
        warn!(received = self.body.len(), incoming = data.len(), capacity = self.body.capacity(), "capture buffer overflow");
        // a short count makes libcurl abort the transfer with a write error
        Ok(0)
    }

    fn header(&mut self, data: &[u8]) -> bool {
        self.headers.observe(data);
        true
    }
}
