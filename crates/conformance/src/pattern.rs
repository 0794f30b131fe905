//! The deterministic content of the checked response.
//!
//! The body is [`TOTAL_CHUNKS`] segments of [`CHUNK_SIZE`] bytes. Segment `i`
//! repeats the byte `'A' + i`, so a misplaced or dropped chunk shows up as a
//! wrong letter at a known offset. After the last segment the generator
//! registers the `Footer: working` trailer and ends the stream.

use chunkcheck_http::protocol::body::{ContentReader, ReadStatus};
use chunkcheck_http::protocol::{ContentError, Footers};
use tracing::trace;

/// Bytes produced per pull.
pub const CHUNK_SIZE: usize = 128;

/// Segments in one response.
pub const TOTAL_CHUNKS: usize = 10;

/// The byte of the first segment.
pub const BASE_BYTE: u8 = b'A';

/// Length of the complete body.
pub const BODY_LEN: usize = CHUNK_SIZE * TOTAL_CHUNKS;

pub const FOOTER_NAME: &str = "Footer";
pub const FOOTER_VALUE: &str = "working";

/// The byte every position of segment `index` holds.
pub fn segment_byte(index: usize) -> u8 {
    debug_assert!(index < TOTAL_CHUNKS);
    #[allow(clippy::cast_possible_truncation, reason = "index is below TOTAL_CHUNKS")]
    let offset = index as u8;
    BASE_BYTE + offset
}

/// The complete expected body.
pub fn expected_body() -> Vec<u8> {
    (0..TOTAL_CHUNKS).flat_map(|index| [segment_byte(index); CHUNK_SIZE]).collect()
}

/// Generation state of one response.
///
/// Owned by exactly one response body and dropped with it, whether the stream
/// completed or the connection went away.
#[derive(Debug, Default)]
pub struct PatternGenerator {
    cursor: u64,
    finished: bool,
}

impl PatternGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes produced so far, always a multiple of [`CHUNK_SIZE`].
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn end(&mut self, footers: &mut Footers) -> Result<ReadStatus, ContentError> {
        if !self.finished {
            footers.add(FOOTER_NAME, FOOTER_VALUE)?;
            self.finished = true;
            trace!(cursor = self.cursor, "pattern complete, footer registered");
        }
        Ok(ReadStatus::EndOfStream)
    }
}

impl ContentReader for PatternGenerator {
    fn read(&mut self, position: u64, buf: &mut [u8], footers: &mut Footers) -> Result<ReadStatus, ContentError> {
        debug_assert_eq!(position, self.cursor, "the body asked for a position the generator did not reach");

        if self.finished || self.cursor >= BODY_LEN as u64 {
            return self.end(footers);
        }

        debug_assert!(buf.len() >= CHUNK_SIZE, "read buffer of {} bytes can't hold a segment", buf.len());
        if buf.len() < CHUNK_SIZE {
            return Err(ContentError::BufferTooSmall { required: CHUNK_SIZE, offered: buf.len() });
        }

        #[allow(clippy::cast_possible_truncation, reason = "cursor is below the body length")]
        let segment = (self.cursor / CHUNK_SIZE as u64) as usize;
        buf[..CHUNK_SIZE].fill(segment_byte(segment));
        self.cursor += CHUNK_SIZE as u64;
        Ok(ReadStatus::Data(CHUNK_SIZE))
    }
}

impl Drop for PatternGenerator {
    fn drop(&mut self) {
        trace!(cursor = self.cursor, finished = self.finished, "generation state released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull(generator: &mut PatternGenerator, buf: &mut [u8], footers: &mut Footers) -> ReadStatus {
        let position = generator.cursor();
        generator.read(position, buf, footers).unwrap()
    }

    #[test]
    fn first_pull_is_segment_a() {
        let mut generator = PatternGenerator::new();
        let mut buf = [0u8; 1024];
        let mut footers = Footers::new();

        assert_eq!(pull(&mut generator, &mut buf, &mut footers), ReadStatus::Data(CHUNK_SIZE));
        assert!(buf[..CHUNK_SIZE].iter().all(|&b| b == b'A'));
        assert!(buf[CHUNK_SIZE..].iter().all(|&b| b == 0));
        assert_eq!(generator.cursor(), 128);
        assert!(footers.is_empty());
    }

    #[test]
    fn tenth_pull_is_segment_j() {
        let mut generator = PatternGenerator { cursor: 9 * 128, finished: false };
        let mut buf = [0u8; CHUNK_SIZE];
        let mut footers = Footers::new();

        assert_eq!(pull(&mut generator, &mut buf, &mut footers), ReadStatus::Data(CHUNK_SIZE));
        assert!(buf.iter().all(|&b| b == b'J'));
        assert_eq!(generator.cursor(), 1280);
    }

    #[test]
    fn end_registers_footer_once() {
        let mut generator = PatternGenerator { cursor: 1280, finished: false };
        let mut buf = [0u8; CHUNK_SIZE];
        let mut footers = Footers::new();

        assert_eq!(pull(&mut generator, &mut buf, &mut footers), ReadStatus::EndOfStream);
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(footers.len(), 1);
        assert_eq!(footers.get("footer").unwrap(), "working");

        assert_eq!(pull(&mut generator, &mut buf, &mut footers), ReadStatus::EndOfStream);
        assert_eq!(footers.len(), 1);
        assert!(generator.is_finished());
    }

    #[test]
    fn full_run_matches_expected_body() {
        let mut generator = PatternGenerator::new();
        let mut footers = Footers::new();
        let mut body = Vec::new();
        let mut buf = [0u8; 1024];

        loop {
            match pull(&mut generator, &mut buf, &mut footers) {
                ReadStatus::Data(n) => body.extend_from_slice(&buf[..n]),
                ReadStatus::EndOfStream => break,
            }
        }

        assert_eq!(body.len(), BODY_LEN);
        assert_eq!(body, expected_body());
        assert_eq!(&body[640..643], b"FFF");
        assert_eq!(footers.get(FOOTER_NAME).unwrap(), FOOTER_VALUE);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "can't hold a segment")]
    fn undersized_buffer_panics_in_debug() {
        let mut generator = PatternGenerator::new();
        let mut buf = [0u8; 64];
        pull(&mut generator, &mut buf, &mut Footers::new());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn undersized_buffer_fails_in_release() {
        let mut generator = PatternGenerator::new();
        let mut buf = [0u8; 64];
        let result = generator.read(0, &mut buf, &mut Footers::new());
        assert!(matches!(result, Err(ContentError::BufferTooSmall { required: 128, offered: 64 })));
        assert_eq!(generator.cursor(), 0);
    }

    #[test]
    fn segment_bytes() {
        assert_eq!(segment_byte(0), b'A');
        assert_eq!(segment_byte(9), b'J');
        assert_eq!(expected_body().len(), 1280);
    }
}
