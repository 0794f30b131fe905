//! HTTP header processing for requests and responses.
//!
//! - [`HeaderDecoder`]: parses a request head with `httparse` and picks the
//!   request payload framing
//! - [`HeaderEncoder`]: writes the status line and header block, filling in the
//!   framing headers for the chosen [`PayloadSize`](crate::protocol::PayloadSize)
//!
//! Field names are written in canonical form (`Transfer-Encoding`, not
//! `transfer-encoding`), for headers and chunked trailers alike.

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;

use bytes::{BufMut, BytesMut};
use http::{HeaderMap, HeaderName};

/// Writes `name` with the first letter of every dash separated word capitalized.
pub(crate) fn put_title_case(dst: &mut BytesMut, name: &HeaderName) {
    let mut upper = true;
    for &b in name.as_str().as_bytes() {
        dst.put_u8(if upper { b.to_ascii_uppercase() } else { b });
        upper = b == b'-';
    }
}

/// Writes every field as a `Name: value` line.
pub(crate) fn put_fields(dst: &mut BytesMut, fields: &HeaderMap) {
    for (name, value) in fields {
        put_title_case(dst, name);
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn names_are_title_cased() {
        let mut dst = BytesMut::new();
        put_title_case(&mut dst, &http::header::TRANSFER_ENCODING);
        assert_eq!(&dst[..], b"Transfer-Encoding");

        let mut dst = BytesMut::new();
        put_title_case(&mut dst, &HeaderName::from_static("x-a-b"));
        assert_eq!(&dst[..], b"X-A-B");
    }

    #[test]
    fn fields_are_written_as_lines() {
        let mut fields = HeaderMap::new();
        fields.insert("footer", HeaderValue::from_static("working"));

        let mut dst = BytesMut::new();
        put_fields(&mut dst, &fields);
        assert_eq!(&dst[..], b"Footer: working\r\n");
    }
}
