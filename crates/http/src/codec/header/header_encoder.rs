//! HTTP response head encoder.
//!
//! Writes the status line and header block of a response. The framing headers are
//! always derived from the [`PayloadSize`] the connection chose, overriding
//! whatever the handler put there:
//!
//! | payload      | written                          |
//! |--------------|----------------------------------|
//! | `Length(n)`  | `Content-Length: n`              |
//! | `Chunked`    | `Transfer-Encoding: chunked`     |
//! | `UntilClose` | neither                          |
//! | `Empty`      | `Content-Length: 0`              |

use std::io;
use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, Version, header};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::header::put_fields;
use crate::protocol::{PayloadSize, ResponseHead, SendError};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");

/// Encoder for HTTP response heads implementing the [`Encoder`] trait.
#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match head.version() {
            Version::HTTP_10 | Version::HTTP_11 => {
                let status = head.status();
                write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or("Unknown"))?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        }

        let headers = head.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, CHUNKED);
            }
            PayloadSize::UntilClose => {
                headers.remove(header::CONTENT_LENGTH);
                headers.remove(header::TRANSFER_ENCODING);
            }
            PayloadSize::Empty => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
            }
        }

        put_fields(dst, headers);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Fast writer implementation for writing to BytesMut.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Response, StatusCode};

    fn encode(head: ResponseHead, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn chunked_head_is_title_cased() {
        let head = Response::builder().status(StatusCode::OK).header("x-test", "1").body(()).unwrap();
        let encoded = encode(head, PayloadSize::Chunked);

        assert!(encoded.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(encoded.contains("X-Test: 1\r\n"));
        assert!(encoded.contains("Transfer-Encoding: chunked\r\n"));
        assert!(!encoded.contains("Content-Length"));
        assert!(encoded.ends_with("\r\n\r\n"));
    }

    #[test]
    fn close_delimited_head_drops_framing_headers() {
        let head = Response::builder().header(header::TRANSFER_ENCODING, "chunked").header(header::CONNECTION, "close").body(()).unwrap();
        let encoded = encode(head, PayloadSize::UntilClose);

        assert!(!encoded.contains("Transfer-Encoding"));
        assert!(!encoded.contains("Content-Length"));
        assert!(encoded.contains("Connection: close\r\n"));
    }

    #[test]
    fn known_length_and_empty() {
        let encoded = encode(Response::new(()), PayloadSize::Length(1280));
        assert!(encoded.contains("Content-Length: 1280\r\n"));

        let encoded = encode(Response::new(()), PayloadSize::Empty);
        assert!(encoded.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn http_2_is_unsupported() {
        let head = Response::builder().version(Version::HTTP_2).body(()).unwrap();
        let mut dst = BytesMut::new();
        assert!(HeaderEncoder.encode((head, PayloadSize::Empty), &mut dst).is_err());
    }
}
