//! Decoder for HTTP chunked transfer encoding.
//!
//! Implements the chunked body grammar of
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1):
//! size lines in hex with optional extensions, chunk data followed by CRLF, and a
//! last-chunk followed by an optional trailer section.

use std::cmp;

use bytes::{Buf, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem};

/// Longest accepted chunk size line, extensions included
const MAX_SIZE_LINE: usize = 1024;

/// Maximum number of trailer fields
const MAX_TRAILER_NUM: usize = 32;

/// Maximum size in bytes of the trailer section
const MAX_TRAILER_BYTES: usize = 8 * 1024;

/// A decoder for handling HTTP chunked transfer encoding.
///
/// Yields chunk data as it arrives, then the trailer fields when the peer sent
/// any, then EOF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read a chunk size line
    Size,
    /// Read chunk data, the value is what is left of the chunk
    Data(u64),
    /// Read the CRLF closing chunk data
    DataEnd,
    /// Read the trailer section after the last chunk
    Trailers,
    /// Body complete
    End,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: ChunkedState::Size }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                ChunkedState::Size => {
                    let Some(line_end) = find_crlf(src) else {
                        ensure!(src.len() <= MAX_SIZE_LINE, ParseError::invalid_body("chunk size line too long"));
                        return Ok(None);
                    };
                    let size = parse_chunk_size(&src[..line_end])?;
                    src.advance(line_end + 2);
                    trace!(size, "read chunk size");
                    self.state = if size == 0 { ChunkedState::Trailers } else { ChunkedState::Data(size) };
                }

                ChunkedState::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let read_size = cmp::min(remaining, src.len() as u64) as usize;
                    let bytes = src.split_to(read_size).freeze();
                    let left = remaining - read_size as u64;
                    self.state = if left == 0 { ChunkedState::DataEnd } else { ChunkedState::Data(left) };
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                ChunkedState::DataEnd => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    ensure!(src.starts_with(b"\r\n"), ParseError::invalid_body("chunk data not followed by CRLF"));
                    src.advance(2);
                    self.state = ChunkedState::Size;
                }

                ChunkedState::Trailers => {
                    let Some((consumed, fields)) = parse_trailers(src)? else {
                        return Ok(None);
                    };
                    src.advance(consumed);
                    self.state = ChunkedState::End;
                    if !fields.is_empty() {
                        trace!(count = fields.len(), "read chunked trailers");
                        return Ok(Some(PayloadItem::Trailers(fields)));
                    }
                }

                ChunkedState::End => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }
            }
        }
    }
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(2).position(|w| w == b"\r\n")
}

/// Parses `1*HEXDIG *WS [ ";" extensions ]`; extensions are ignored.
fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    ensure!(!line.contains(&b'\n'), ParseError::invalid_body("chunk size line contains a bare LF"));

    let digits = line.split(|b| *b == b';').next().unwrap_or_default();
    let digits = digits.trim_ascii_end();
    ensure!(!digits.is_empty(), ParseError::invalid_body("chunk size is missing"));

    digits
        .iter()
        .try_fold(0u64, |size, b| {
            let digit = char::from(*b).to_digit(16)?;
            size.checked_mul(16)?.checked_add(u64::from(digit))
        })
        .ok_or_else(|| ParseError::invalid_body(format!("invalid chunk size {:?}", String::from_utf8_lossy(digits))))
}

/// Parses the trailer section, returning how many bytes it took.
fn parse_trailers(src: &[u8]) -> Result<Option<(usize, HeaderMap)>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_TRAILER_NUM];
    let status = httparse::parse_headers(src, &mut headers).map_err(|e| match e {
        httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_TRAILER_NUM),
        e => ParseError::invalid_body(format!("invalid trailer section: {e}")),
    })?;

    match status {
        Status::Complete((consumed, parsed)) => {
            let mut fields = HeaderMap::with_capacity(parsed.len());
            for field in parsed {
                let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(ParseError::invalid_body)?;
                let value = HeaderValue::from_bytes(field.value).map_err(ParseError::invalid_body)?;
                fields.append(name, value);
            }
            Ok(Some((consumed, fields)))
        }
        Status::Partial => {
            ensure!(src.len() <= MAX_TRAILER_BYTES, ParseError::too_large_header(src.len(), MAX_TRAILER_BYTES));
            Ok(None)
        }
    }
}
